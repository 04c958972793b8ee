use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};
use num_complex::Complex32;
use parking_lot::Mutex;

use crate::models::channel_state::{Applied, ChannelState, IqBalanceMode, IqCorrection};
use crate::models::config::SourceConfiguration;
use crate::models::descriptor::parse_device_args;
use crate::models::error::SourceError;
use crate::models::range::{FreqRange, GainRange, MetaRange};
use crate::models::state::SourceState;
use crate::processing::fan_out::NoiseFanOut;
use crate::processing::iq_balance::IqBalanceStage;
use crate::processing::noise::GaussianNoiseSource;
use crate::processing::throttle::Throttle;
use crate::session::channel_map::{ChannelMap, ChannelRoute};
use crate::session::registry::BackendRegistry;
use crate::session::stream::ChannelStream;
use crate::storage::report::{ChannelReport, DeviceReport, SourceReport};
use crate::traits::source_device::{DeviceHandle, SourceDevice};

/// Several receive devices presented as one multi-channel source.
///
/// Device channels are numbered consecutively in argument order:
/// ```text
/// "sim=0,nchan=2 file=/tmp/a.cfile"
///
///  virtual 0 ─→ sim #0   local 0 ─→ [I/Q stage] ─→ out 0
///  virtual 1 ─→ sim #0   local 1 ─→ [I/Q stage] ─→ out 1
///  virtual 2 ─→ file     local 0 ─→ [I/Q stage] ─→ out 2
/// ```
///
/// Per-channel setters consult a cache and only reach the hardware when the
/// requested value changes. Channel indices outside the device channels are
/// tolerated: setters and getters return a neutral value (0, empty string,
/// empty range) and log at debug level. Use [`resolve`](Self::resolve) or
/// [`read`](Self::read) where the distinction matters.
pub struct AggregateSource {
    config: SourceConfiguration,
    devices: Vec<DeviceHandle>,
    channel_map: ChannelMap,
    // one entry per device channel
    channels: Vec<ChannelState>,
    iq_stages: Vec<Option<Arc<Mutex<IqBalanceStage>>>>,
    // one entry per output, device channels first
    outputs: Vec<ChannelStream>,
    noise: Option<Arc<Mutex<NoiseFanOut>>>,
    sample_rate: Option<Applied<f64>>,
    state: SourceState,
}

impl AggregateSource {
    /// Build the source, degrading to synthetic noise if construction fails.
    ///
    /// Devices constructed before the failure keep their channels; the
    /// remaining declared outputs are fed from one shared gaussian noise
    /// generator behind one rate limiter.
    pub fn new(config: SourceConfiguration, registry: &BackendRegistry) -> Self {
        let mut source = Self::empty(config);
        if let Err(reason) = source.connect(registry) {
            source.fall_back(reason);
        }
        source
    }

    /// Build the source or report why it could not be built.
    pub fn try_new(config: SourceConfiguration, registry: &BackendRegistry) -> Result<Self, SourceError> {
        let mut source = Self::empty(config);
        source.connect(registry)?;
        Ok(source)
    }

    /// Wrap already constructed devices, in order.
    pub fn from_devices(config: SourceConfiguration, devices: Vec<Box<dyn SourceDevice>>) -> Result<Self, SourceError> {
        config.validate().map_err(SourceError::ConfigurationFailed)?;
        let declared = devices.iter().map(|d| d.num_channels()).sum::<usize>();
        let declared = config.output_channels.unwrap_or(declared);

        let mut source = Self::empty(config);
        for device in devices {
            source.attach(device, declared)?;
        }
        source.check_connected(declared)?;
        Ok(source)
    }

    fn empty(config: SourceConfiguration) -> Self {
        Self {
            config,
            devices: Vec::new(),
            channel_map: ChannelMap::new(),
            channels: Vec::new(),
            iq_stages: Vec::new(),
            outputs: Vec::new(),
            noise: None,
            sample_rate: None,
            state: SourceState::Hardware,
        }
    }

    fn connect(&mut self, registry: &BackendRegistry) -> Result<(), SourceError> {
        self.config.validate().map_err(SourceError::ConfigurationFailed)?;
        registry.log_banner();

        let declared = self.config.declared_channels();
        let descriptors = registry.select(parse_device_args(&self.config.args))?;

        for descriptor in &descriptors {
            match registry.create(descriptor) {
                Some(device) => self.attach(device?, declared)?,
                None => debug!("no backend for '{}', skipping", descriptor),
            }
        }

        if self.devices.is_empty() {
            return Err(SourceError::NoDevicesSpecified);
        }
        self.check_connected(declared)
    }

    fn attach(&mut self, device: Box<dyn SourceDevice>, declared: usize) -> Result<(), SourceError> {
        let name = device.name();
        let count = device.num_channels();
        if self.outputs.len() + count > declared {
            return Err(SourceError::ConfigurationFailed(format!(
                "{} adds {} channel(s) to {} connected, only {} declared",
                name,
                count,
                self.outputs.len(),
                declared
            )));
        }

        let handle: DeviceHandle = Arc::new(Mutex::new(device));
        let range = self.channel_map.push_device(count);
        info!("using {} for channel(s) {}..{}", name, range.start, range.end);

        for (local, channel) in range.enumerate() {
            let iq = self
                .config
                .enable_iq_balance
                .then(|| Arc::new(Mutex::new(IqBalanceStage::new())));
            self.channels.push(ChannelState::default());
            self.iq_stages.push(iq.clone());
            self.outputs
                .push(ChannelStream::device(channel, Arc::clone(&handle), local, iq));
        }
        self.devices.push(handle);
        Ok(())
    }

    fn check_connected(&self, declared: usize) -> Result<(), SourceError> {
        if self.outputs.len() < declared {
            return Err(SourceError::ConfigurationFailed(format!(
                "{} channel(s) connected, {} declared",
                self.outputs.len(),
                declared
            )));
        }
        Ok(())
    }

    fn fall_back(&mut self, reason: SourceError) {
        error!("FATAL: {}", reason);

        let declared = self.config.declared_channels();
        let missing = declared.saturating_sub(self.outputs.len());
        warn!("trying to fill up {} missing channel(s) with gaussian noise", missing);

        let defaults = SourceConfiguration::default();
        let settings = if self.config.validate().is_ok() {
            &self.config
        } else {
            &defaults
        };
        let noise = GaussianNoiseSource::new(settings.noise_amplitude).expect("failed to create fallback noise source");
        let throttle = Throttle::new(settings.fallback_sample_rate);
        let fan_out = Arc::new(Mutex::new(NoiseFanOut::new(
            noise,
            throttle,
            settings.fallback_block_size,
            missing,
        )));

        for tap in 0..missing {
            let channel = self.outputs.len();
            self.outputs
                .push(ChannelStream::synthetic(channel, Arc::clone(&fan_out), tap));
        }
        self.noise = Some(fan_out);
        self.state = SourceState::Degraded {
            reason,
            synthetic_channels: missing,
        };
    }

    // --- Introspection ---

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn config(&self) -> &SourceConfiguration {
        &self.config
    }

    pub fn devices(&self) -> &[DeviceHandle] {
        &self.devices
    }

    /// Device channels across all devices. Synthetic outputs are not counted.
    pub fn num_channels(&self) -> usize {
        self.channel_map.total_channels()
    }

    /// Connected outputs, synthetic ones included.
    pub fn output_channels(&self) -> usize {
        self.outputs.len()
    }

    pub fn resolve(&self, channel: usize) -> Option<ChannelRoute> {
        self.channel_map.resolve(channel)
    }

    pub fn resolve_checked(&self, channel: usize) -> Result<ChannelRoute, SourceError> {
        self.resolve(channel).ok_or(SourceError::ChannelOutOfRange {
            channel,
            available: self.num_channels(),
        })
    }

    /// Cached settings of a device channel.
    pub fn channel_state(&self, channel: usize) -> Option<&ChannelState> {
        self.channels.get(channel)
    }

    // --- Samples ---

    /// Sample path of an output channel, for a dedicated streaming thread.
    pub fn stream(&self, channel: usize) -> Option<ChannelStream> {
        self.outputs.get(channel).cloned()
    }

    pub fn read(&self, channel: usize, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        self.outputs
            .get(channel)
            .ok_or(SourceError::ChannelOutOfRange {
                channel,
                available: self.outputs.len(),
            })?
            .read(buf)
    }

    // --- Sample rate ---

    /// Rates supported by the first device.
    pub fn sample_rates(&self) -> MetaRange {
        match self.devices.first() {
            Some(device) => device.lock().sample_rates(),
            None => MetaRange::new(),
        }
    }

    /// Set the rate of every device.
    ///
    /// Returns the rate the first device applied. Channels in automatic I/Q
    /// mode re-derive their estimator period from their device's new rate.
    pub fn set_sample_rate(&mut self, rate: f64) -> Result<f64, SourceError> {
        if self.devices.is_empty() {
            debug!("set_sample_rate: no devices");
            return Ok(self.sample_rate());
        }
        if let Some(applied) = &self.sample_rate {
            if applied.requested == rate {
                debug!("sample rate {} unchanged", rate);
                return Ok(applied.actual);
            }
        }
        self.sample_rate = Some(Applied::pending(rate));

        let mut rates = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            match device.lock().set_sample_rate(rate) {
                Ok(actual) => rates.push(actual),
                Err(e) => {
                    self.sample_rate = None;
                    return Err(e);
                }
            }
        }

        let actual = rates[0];
        if rates.iter().any(|&r| r != actual) {
            warn!("devices disagree on the applied sample rate for {}: {:?}", rate, rates);
        }
        if let Some(applied) = &mut self.sample_rate {
            applied.actual = actual;
        }

        for (route, stage) in self.channel_map.routes().zip(&self.iq_stages) {
            if let Some(stage) = stage {
                let device_rate = self.devices[route.device].lock().sample_rate();
                stage.lock().on_sample_rate_changed(device_rate);
            }
        }
        Ok(actual)
    }

    /// Rate of the first device, or of the noise generator when there is none.
    pub fn sample_rate(&self) -> f64 {
        match (self.devices.first(), &self.noise) {
            (Some(device), _) => device.lock().sample_rate(),
            (None, Some(fan_out)) => fan_out.lock().sample_rate(),
            (None, None) => 0.0,
        }
    }

    // --- Frequency ---

    pub fn freq_range(&self, chan: usize) -> FreqRange {
        self.query(chan, "freq_range", |dev, local| dev.freq_range(local))
    }

    pub fn set_center_freq(&mut self, freq: f64, chan: usize) -> Result<f64, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_center_freq") else {
            return Ok(0.0);
        };
        apply_cached("center frequency", chan, freq, &mut state.center_freq, device, |dev| {
            dev.set_center_freq(freq, local)
        })
    }

    pub fn center_freq(&self, chan: usize) -> f64 {
        self.query(chan, "center_freq", |dev, local| dev.center_freq(local))
    }

    pub fn set_freq_corr(&mut self, ppm: f64, chan: usize) -> Result<f64, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_freq_corr") else {
            return Ok(0.0);
        };
        apply_cached("frequency correction", chan, ppm, &mut state.freq_corr, device, |dev| {
            dev.set_freq_corr(ppm, local)
        })
    }

    pub fn freq_corr(&self, chan: usize) -> f64 {
        self.query(chan, "freq_corr", |dev, local| dev.freq_corr(local))
    }

    // --- Gain ---

    pub fn gain_names(&self, chan: usize) -> Vec<String> {
        self.query(chan, "gain_names", |dev, local| dev.gain_names(local))
    }

    pub fn gain_range(&self, chan: usize) -> GainRange {
        self.query(chan, "gain_range", |dev, local| dev.gain_range(local))
    }

    pub fn named_gain_range(&self, name: &str, chan: usize) -> GainRange {
        self.query(chan, "named_gain_range", |dev, local| dev.named_gain_range(name, local))
    }

    /// Switch automatic gain control. Leaving automatic mode re-applies the
    /// last manual gain, since many devices forget it.
    pub fn set_gain_mode(&mut self, automatic: bool, chan: usize) -> Result<bool, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_gain_mode") else {
            return Ok(false);
        };
        let changing = state
            .gain_mode
            .as_ref()
            .map_or(true, |mode| mode.requested != automatic);

        let applied = apply_cached("gain mode", chan, automatic, &mut state.gain_mode, device, |dev| {
            dev.set_gain_mode(automatic, local)
        })?;

        if changing && !automatic {
            if let Some(gain) = state.manual_gain() {
                debug!("channel {}: restoring manual gain {} dB", chan, gain);
                let actual = device.lock().set_gain(gain, local)?;
                if let Some(cached) = &mut state.gain {
                    cached.actual = actual;
                }
            }
        }
        Ok(applied)
    }

    pub fn gain_mode(&self, chan: usize) -> bool {
        self.query(chan, "gain_mode", |dev, local| dev.gain_mode(local))
    }

    pub fn set_gain(&mut self, gain: f64, chan: usize) -> Result<f64, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_gain") else {
            return Ok(0.0);
        };
        apply_cached("gain", chan, gain, &mut state.gain, device, |dev| dev.set_gain(gain, local))
    }

    pub fn set_named_gain(&mut self, gain: f64, name: &str, chan: usize) -> Result<f64, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_named_gain") else {
            return Ok(0.0);
        };
        let slot = state.named_gains.entry(name.to_string()).or_insert(None);
        apply_cached(name, chan, gain, slot, device, |dev| dev.set_named_gain(gain, name, local))
    }

    pub fn gain(&self, chan: usize) -> f64 {
        self.query(chan, "gain", |dev, local| dev.gain(local))
    }

    pub fn named_gain(&self, name: &str, chan: usize) -> f64 {
        self.query(chan, "named_gain", |dev, local| dev.named_gain(name, local))
    }

    pub fn set_if_gain(&mut self, gain: f64, chan: usize) -> Result<f64, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_if_gain") else {
            return Ok(0.0);
        };
        apply_cached("IF gain", chan, gain, &mut state.if_gain, device, |dev| dev.set_if_gain(gain, local))
    }

    pub fn if_gain(&self, chan: usize) -> f64 {
        self.query(chan, "if_gain", |dev, local| dev.if_gain(local))
    }

    pub fn set_bb_gain(&mut self, gain: f64, chan: usize) -> Result<f64, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_bb_gain") else {
            return Ok(0.0);
        };
        apply_cached("BB gain", chan, gain, &mut state.bb_gain, device, |dev| dev.set_bb_gain(gain, local))
    }

    pub fn bb_gain(&self, chan: usize) -> f64 {
        self.query(chan, "bb_gain", |dev, local| dev.bb_gain(local))
    }

    // --- Antenna ---

    pub fn antennas(&self, chan: usize) -> Vec<String> {
        self.query(chan, "antennas", |dev, local| dev.antennas(local))
    }

    pub fn set_antenna(&mut self, antenna: &str, chan: usize) -> Result<String, SourceError> {
        let Some((device, local, state)) = self.route_mut(chan, "set_antenna") else {
            return Ok(String::new());
        };
        apply_cached("antenna", chan, antenna.to_string(), &mut state.antenna, device, |dev| {
            dev.set_antenna(antenna, local)
        })
    }

    pub fn antenna(&self, chan: usize) -> String {
        self.query(chan, "antenna", |dev, local| dev.antenna(local))
    }

    // --- I/Q balance ---

    /// Change the I/Q balance mode of a channel. Automatic mode sizes the
    /// estimator period from the channel's device rate.
    pub fn set_iq_balance_mode(&mut self, mode: IqBalanceMode, chan: usize) {
        let Some(route) = self.channel_map.resolve(chan) else {
            debug!("set_iq_balance_mode: channel {} out of range", chan);
            return;
        };
        let Some(stage) = &self.iq_stages[chan] else {
            debug!("set_iq_balance_mode: I/Q balance disabled");
            return;
        };
        let rate = self.devices[route.device].lock().sample_rate();
        stage.lock().set_mode(mode, rate);
        self.channels[chan].iq_mode = mode;
    }

    pub fn iq_balance_mode(&self, chan: usize) -> IqBalanceMode {
        self.channels
            .get(chan)
            .map(|state| state.iq_mode)
            .unwrap_or_default()
    }

    /// Manual magnitude/phase correction. Takes effect in manual mode only;
    /// ignored in off and automatic mode.
    pub fn set_iq_balance(&mut self, correction: IqCorrection, chan: usize) {
        let Some(Some(stage)) = self.iq_stages.get(chan) else {
            debug!("set_iq_balance: no I/Q stage on channel {}", chan);
            return;
        };
        if stage.lock().set_correction(correction) {
            self.channels[chan].iq_correction = Some(correction);
        } else {
            debug!(
                "channel {}: manual I/Q correction ignored in {:?} mode",
                chan, self.channels[chan].iq_mode
            );
        }
    }

    /// Correction currently applied to the channel's samples.
    pub fn iq_balance(&self, chan: usize) -> IqCorrection {
        match self.iq_stages.get(chan) {
            Some(Some(stage)) => stage.lock().correction(),
            _ => IqCorrection::NEUTRAL,
        }
    }

    // --- Report ---

    /// Snapshot of the channel layout and cached settings.
    pub fn report(&self) -> SourceReport {
        let devices = self
            .devices
            .iter()
            .map(|device| {
                let device = device.lock();
                DeviceReport {
                    name: device.name(),
                    channels: device.num_channels(),
                }
            })
            .collect();

        let channels = self
            .outputs
            .iter()
            .map(|output| {
                let channel = output.channel();
                ChannelReport {
                    channel,
                    route: self.resolve(channel),
                    synthetic: output.is_synthetic(),
                    settings: self.channels.get(channel).cloned(),
                    iq_correction: self.iq_balance(channel),
                }
            })
            .collect();

        SourceReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            args: self.config.args.clone(),
            degraded: self.state.is_degraded(),
            failure: self.state.failure().map(|e| e.to_string()),
            declared_channels: self.config.declared_channels(),
            sample_rate: self.sample_rate(),
            devices,
            channels,
        }
    }

    // --- Internal helpers ---

    fn route_mut(&mut self, chan: usize, what: &str) -> Option<(&DeviceHandle, usize, &mut ChannelState)> {
        match self.channel_map.resolve(chan) {
            Some(route) => Some((&self.devices[route.device], route.local, &mut self.channels[chan])),
            None => {
                debug!(
                    "{}: channel {} out of range (0..{})",
                    what,
                    chan,
                    self.channel_map.total_channels()
                );
                None
            }
        }
    }

    fn query<T: Default>(&self, chan: usize, what: &str, f: impl FnOnce(&dyn SourceDevice, usize) -> T) -> T {
        match self.channel_map.resolve(chan) {
            Some(route) => {
                let device = self.devices[route.device].lock();
                f(&**device, route.local)
            }
            None => {
                debug!(
                    "{}: channel {} out of range (0..{})",
                    what,
                    chan,
                    self.channel_map.total_channels()
                );
                T::default()
            }
        }
    }
}

/// Forward a setting unless the cache says it is already applied.
///
/// The slot is marked before the device call; a failed call clears it so the
/// next attempt reaches the device again.
fn apply_cached<T>(
    what: &str,
    chan: usize,
    value: T,
    slot: &mut Option<Applied<T>>,
    device: &DeviceHandle,
    call: impl FnOnce(&mut dyn SourceDevice) -> Result<T, SourceError>,
) -> Result<T, SourceError>
where
    T: Clone + PartialEq + fmt::Debug,
{
    if let Some(applied) = slot.as_ref() {
        if applied.requested == value {
            debug!("channel {}: {} {:?} unchanged", chan, what, value);
            return Ok(applied.actual.clone());
        }
    }
    *slot = Some(Applied::pending(value));

    let result = {
        let mut device = device.lock();
        call(&mut **device)
    };
    match &result {
        Ok(actual) => {
            if let Some(applied) = slot.as_mut() {
                applied.actual = actual.clone();
            }
        }
        Err(_) => *slot = None,
    }
    result
}
