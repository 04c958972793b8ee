use std::io::Write;

use approx::assert_relative_eq;
use sdr_source_core::{
    AggregateSource, BackendRegistry, ChannelRoute, Complex32, IqBalanceMode, SourceConfiguration, SourceError,
};
use sdr_source_devices::{default_registry, FileBackend, SimBackend};

fn recording(samples: &[Complex32]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for s in samples {
        file.write_all(&s.re.to_le_bytes()).unwrap();
        file.write_all(&s.im.to_le_bytes()).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn sim_and_file_share_one_channel_space() {
    let samples: Vec<Complex32> = (0..16).map(|i| Complex32::new(i as f32 * 0.1, 0.5)).collect();
    let file = recording(&samples);
    let args = format!("sim=0,nchan=2 file={},throttle=false", file.path().display());
    let mut source = AggregateSource::try_new(SourceConfiguration::with_args(args), &default_registry()).unwrap();

    assert_eq!(source.num_channels(), 3);
    assert_eq!(source.resolve(2), Some(ChannelRoute { device: 1, local: 0 }));
    assert_eq!(source.gain_names(1), vec!["LNA"]);
    assert!(source.gain_names(2).is_empty());

    assert_eq!(source.set_center_freq(433_920_400.0, 1).unwrap(), 433_920_000.0);
    assert_eq!(source.center_freq(1), 433_920_000.0);
    assert_eq!(source.center_freq(0), 100e6);
    assert_eq!(source.set_center_freq(137.1e6, 2).unwrap(), 137.1e6);

    let mut buf = vec![Complex32::default(); 16];
    assert_eq!(source.read(2, &mut buf).unwrap(), 16);
    assert_eq!(buf, samples);
}

#[test]
fn first_device_decides_the_reported_rate() {
    let file = recording(&[Complex32::new(1.0, 0.0)]);
    let args = format!("sim=0 file={},throttle=false", file.path().display());
    let mut source = AggregateSource::try_new(SourceConfiguration::with_args(args), &default_registry()).unwrap();

    // the sim snaps to its rate table, the file takes any rate
    assert_eq!(source.set_sample_rate(2e6).unwrap(), 2.048e6);
    assert_eq!(source.sample_rate(), 2.048e6);
    assert_eq!(source.devices()[1].lock().sample_rate(), 2e6);
}

#[test]
fn manual_gain_survives_automatic_gain_control() {
    let mut source =
        AggregateSource::try_new(SourceConfiguration::with_args("sim=0"), &default_registry()).unwrap();

    assert_eq!(source.set_gain(30.0, 0).unwrap(), 29.7);
    source.set_gain_mode(true, 0).unwrap();
    source.set_gain_mode(false, 0).unwrap();
    assert_eq!(source.gain(0), 29.7);
}

#[test]
fn automatic_iq_balance_removes_injected_imbalance() {
    let args = "sim=0,rate=250e3,tone=1000,iq_mag=0.2,iq_phase=0.1";
    let mut source = AggregateSource::try_new(SourceConfiguration::with_args(args), &default_registry()).unwrap();
    source.set_iq_balance_mode(IqBalanceMode::Automatic, 0);

    // one estimate per 50k samples at 250 kS/s
    let mut buf = vec![Complex32::default(); 50_000];
    for _ in 0..3 {
        source.read(0, &mut buf).unwrap();
    }

    let correction = source.iq_balance(0);
    assert_relative_eq!(correction.magnitude, 0.2, epsilon = 0.01);
    assert_relative_eq!(correction.phase, 0.1, epsilon = 0.01);

    source.read(0, &mut buf).unwrap();
    let n = buf.len() as f32;
    let power_i = buf.iter().map(|s| s.re * s.re).sum::<f32>() / n;
    let power_q = buf.iter().map(|s| s.im * s.im).sum::<f32>() / n;
    let cross = buf.iter().map(|s| s.re * s.im).sum::<f32>() / n;
    assert_relative_eq!((power_q / power_i).sqrt(), 1.0, epsilon = 0.02);
    assert!(cross.abs() < 0.02);
}

#[test]
fn discovery_picks_the_first_simulated_unit() {
    let registry = BackendRegistry::new()
        .with(FileBackend)
        .with(SimBackend::with_devices(2));
    let source = AggregateSource::try_new(SourceConfiguration::with_args(""), &registry).unwrap();
    assert_eq!(source.devices().len(), 1);
    assert_eq!(source.devices()[0].lock().name(), "sim #0 (1 ch)");

    let none = AggregateSource::try_new(SourceConfiguration::with_args(""), &default_registry());
    assert!(matches!(none, Err(SourceError::NoDevicesFound)));
}

#[test]
fn missing_recording_degrades_to_noise() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.cfile");
    let config = SourceConfiguration {
        fallback_sample_rate: 1e12,
        fallback_block_size: 512,
        ..SourceConfiguration::with_args(format!("sim=0,nchan=2 file={}", missing.display()))
    };
    let mut source = AggregateSource::new(config, &default_registry());

    assert!(source.state().is_degraded());
    assert_eq!(source.num_channels(), 2);
    assert_eq!(source.output_channels(), 3);
    assert_eq!(source.set_gain(14.0, 1).unwrap(), 14.4);

    let mut buf = vec![Complex32::default(); 256];
    assert_eq!(source.read(2, &mut buf).unwrap(), 256);
    let power = buf.iter().map(|s| s.norm_sqr()).sum::<f32>() / buf.len() as f32;
    assert!(power > 10.0);

    let report = source.report();
    assert!(report.channels[2].synthetic);
    assert_eq!(report.devices.len(), 1);
}
