//! Energy and resource estimation
//!
//! Energy is a derived estimate, not a hardware reading: each sampled
//! CPU-time delta is converted to millijoules through a base power rate
//! scaled by the reported thermal pressure level. The cumulative total
//! never decreases; a delta that would be negative contributes zero.
//! Peak resident memory is a streaming maximum over instantaneous
//! readings taken on every token chunk, not just at sample boundaries.
//!
//! OS readings come in through the [`SystemProbe`] contract; a missing
//! reading degrades to a zero contribution for that sample and is never
//! an error.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Coarse system thermal pressure level
///
/// Used as a multiplier on estimated power draw: a throttling device burns
/// more energy per unit of CPU time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalState {
    /// No thermal pressure
    Nominal,
    /// Mild pressure
    Fair,
    /// Heavy pressure, throttling likely
    Serious,
    /// Critical pressure, aggressive throttling
    Critical,
}

impl ThermalState {
    /// Power-draw multiplier applied to the base rate
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Nominal => 1.0,
            Self::Fair => 1.2,
            Self::Serious => 1.5,
            Self::Critical => 2.0,
        }
    }

    /// Canonical lowercase name for reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Fair => "fair",
            Self::Serious => "serious",
            Self::Critical => "critical",
        }
    }
}

/// Contract for instantaneous OS readings
///
/// All readings are optional; the estimator treats `None` as a zero
/// contribution.
pub trait SystemProbe {
    /// Cumulative CPU time (user + system) for this process
    fn cpu_time(&self) -> Option<Duration>;

    /// Instantaneous resident memory in bytes
    fn resident_memory(&self) -> Option<u64>;

    /// Current thermal pressure level
    fn thermal_state(&self) -> ThermalState;
}

/// One appended energy sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergySample {
    /// Seconds since run start
    pub timestamp_s: f64,
    /// Cumulative estimated energy in millijoules
    pub cumulative_mj: f64,
    /// Thermal state at sampling time
    pub thermal: ThermalState,
}

/// Estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Base power draw in milliwatts (millijoules per CPU-second) under
    /// nominal thermal state
    pub base_rate_mw: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self { base_rate_mw: 1500.0 }
    }
}

impl EnergyConfig {
    /// Set the base power rate
    #[must_use]
    pub fn with_base_rate_mw(mut self, base_rate_mw: f64) -> Self {
        self.base_rate_mw = base_rate_mw;
        self
    }
}

/// Time-series estimator for energy, peak memory, and CPU time
///
/// `start()` resets all counters and takes the initial sample;
/// `record_sample()` always appends exactly one sample and is safe to call
/// repeatedly (zero elapsed CPU time appends an equal cumulative value);
/// `stop()` takes the final sample. The readers are valid at any time,
/// including mid-run.
pub struct EnergyEstimator {
    probe: Box<dyn SystemProbe + Send>,
    config: EnergyConfig,
    started_at: Option<Instant>,
    base_cpu: Duration,
    last_cpu: Duration,
    total_mj: f64,
    peak_memory: u64,
    samples: Vec<EnergySample>,
}

impl EnergyEstimator {
    /// Create an estimator over a probe
    #[must_use]
    pub fn new(probe: Box<dyn SystemProbe + Send>, config: EnergyConfig) -> Self {
        Self {
            probe,
            config,
            started_at: None,
            base_cpu: Duration::ZERO,
            last_cpu: Duration::ZERO,
            total_mj: 0.0,
            peak_memory: 0,
            samples: Vec::new(),
        }
    }

    /// Reset all counters and take the initial sample
    ///
    /// The initial sample is the zero point: one probe reading establishes
    /// the CPU baseline and the sample is appended at zero cumulative
    /// energy.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
        let cpu = self.probe.cpu_time().unwrap_or(Duration::ZERO);
        self.base_cpu = cpu;
        self.last_cpu = cpu;
        self.total_mj = 0.0;
        self.peak_memory = 0;
        self.samples.clear();
        self.sample_memory();
        self.samples.push(EnergySample {
            timestamp_s: 0.0,
            cumulative_mj: 0.0,
            thermal: self.probe.thermal_state(),
        });
    }

    /// Append exactly one new energy sample
    ///
    /// Accumulates the CPU-time delta since the previous sample into the
    /// running energy total. Deltas are clamped at zero, so the cumulative
    /// sequence is non-decreasing; a missing CPU reading contributes zero.
    pub fn record_sample(&mut self) {
        let thermal = self.probe.thermal_state();
        if let Some(now_cpu) = self.probe.cpu_time() {
            let delta = now_cpu.saturating_sub(self.last_cpu);
            self.total_mj += delta.as_secs_f64() * self.config.base_rate_mw * thermal.multiplier();
            self.last_cpu = self.last_cpu.max(now_cpu);
        }
        self.sample_memory();
        self.samples.push(EnergySample {
            timestamp_s: self
                .started_at
                .map_or(0.0, |t| t.elapsed().as_secs_f64()),
            cumulative_mj: self.total_mj,
            thermal,
        });
    }

    /// Take the final sample
    pub fn stop(&mut self) {
        self.record_sample();
    }

    /// Fold an instantaneous resident-memory reading into the peak
    ///
    /// Called on every stream chunk so the peak reflects mid-generation
    /// usage, not just sample boundaries.
    pub fn sample_memory(&mut self) {
        if let Some(rss) = self.probe.resident_memory() {
            self.peak_memory = self.peak_memory.max(rss);
        }
    }

    /// Cumulative estimated energy in millijoules
    #[must_use]
    pub fn total_energy_mj(&self) -> f64 {
        self.total_mj
    }

    /// Peak resident memory observed since `start()`
    #[must_use]
    pub fn peak_memory_bytes(&self) -> u64 {
        self.peak_memory
    }

    /// Cumulative CPU time consumed since `start()`
    #[must_use]
    pub fn cpu_time(&self) -> Duration {
        self.last_cpu.saturating_sub(self.base_cpu)
    }

    /// All samples appended so far
    #[must_use]
    pub fn samples(&self) -> &[EnergySample] {
        &self.samples
    }
}

// ============================================================================
// Probes
// ============================================================================

/// OS probe backed by `getrusage` on Unix
///
/// CPU time is `ru_utime + ru_stime`. Instantaneous resident memory is
/// read from `/proc/self/statm` on Linux; elsewhere the `ru_maxrss`
/// high-water mark stands in. Thermal state has no portable reading and
/// is supplied by the host layer; it defaults to nominal.
#[derive(Debug, Clone)]
pub struct RusageProbe {
    thermal: ThermalState,
}

impl Default for RusageProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl RusageProbe {
    /// Create a probe reporting nominal thermal state
    #[must_use]
    pub fn new() -> Self {
        Self {
            thermal: ThermalState::Nominal,
        }
    }

    /// Create a probe reporting a fixed thermal state
    #[must_use]
    pub fn with_thermal(thermal: ThermalState) -> Self {
        Self { thermal }
    }

    #[cfg(target_family = "unix")]
    fn rusage() -> Option<libc::rusage> {
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
        // SAFETY: getrusage writes a full rusage struct on success
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if rc == 0 {
            // SAFETY: initialized by getrusage above
            Some(unsafe { usage.assume_init() })
        } else {
            None
        }
    }
}

impl SystemProbe for RusageProbe {
    #[cfg(target_family = "unix")]
    fn cpu_time(&self) -> Option<Duration> {
        let usage = Self::rusage()?;
        let secs = usage.ru_utime.tv_sec as u64 + usage.ru_stime.tv_sec as u64;
        let micros = usage.ru_utime.tv_usec as u64 + usage.ru_stime.tv_usec as u64;
        Some(Duration::from_secs(secs) + Duration::from_micros(micros))
    }

    #[cfg(not(target_family = "unix"))]
    fn cpu_time(&self) -> Option<Duration> {
        None
    }

    #[cfg(target_os = "linux")]
    fn resident_memory(&self) -> Option<u64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        // SAFETY: sysconf is always safe to call
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page_size <= 0 {
            return None;
        }
        Some(resident_pages * page_size as u64)
    }

    #[cfg(all(target_family = "unix", not(target_os = "linux")))]
    fn resident_memory(&self) -> Option<u64> {
        // ru_maxrss is a high-water mark, not instantaneous; still a valid
        // contribution to a peak estimate. Reported in bytes on macOS.
        let usage = Self::rusage()?;
        Some(usage.ru_maxrss as u64)
    }

    #[cfg(not(target_family = "unix"))]
    fn resident_memory(&self) -> Option<u64> {
        None
    }

    fn thermal_state(&self) -> ThermalState {
        self.thermal
    }
}

/// Scripted probe for deterministic tests
///
/// CPU and memory readings are served from FIFO queues; when a queue runs
/// dry the last value repeats (or `None` if the queue was empty from the
/// start).
pub struct ScriptedProbe {
    cpu: Mutex<VecDeque<Duration>>,
    last_cpu: Mutex<Option<Duration>>,
    memory: Mutex<VecDeque<u64>>,
    last_memory: Mutex<Option<u64>>,
    thermal: ThermalState,
}

impl ScriptedProbe {
    /// Create a probe over fixed CPU and memory reading sequences
    #[must_use]
    pub fn new(cpu_readings: &[Duration], memory_readings: &[u64], thermal: ThermalState) -> Self {
        Self {
            cpu: Mutex::new(cpu_readings.iter().copied().collect()),
            last_cpu: Mutex::new(None),
            memory: Mutex::new(memory_readings.iter().copied().collect()),
            last_memory: Mutex::new(None),
            thermal,
        }
    }

    /// Probe with no readings at all (every reading missing)
    #[must_use]
    pub fn empty() -> Self {
        Self::new(&[], &[], ThermalState::Nominal)
    }
}

impl SystemProbe for ScriptedProbe {
    fn cpu_time(&self) -> Option<Duration> {
        let mut queue = self.cpu.lock().ok()?;
        let mut last = self.last_cpu.lock().ok()?;
        if let Some(next) = queue.pop_front() {
            *last = Some(next);
        }
        *last
    }

    fn resident_memory(&self) -> Option<u64> {
        let mut queue = self.memory.lock().ok()?;
        let mut last = self.last_memory.lock().ok()?;
        if let Some(next) = queue.pop_front() {
            *last = Some(next);
        }
        *last
    }

    fn thermal_state(&self) -> ThermalState {
        self.thermal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(list: &[u64]) -> Vec<Duration> {
        list.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_start_resets_and_takes_initial_sample() {
        let probe = ScriptedProbe::new(&secs(&[10, 12]), &[100], ThermalState::Nominal);
        let mut est = EnergyEstimator::new(Box::new(probe), EnergyConfig::default());
        est.start();
        assert_eq!(est.samples().len(), 1);
        assert_eq!(est.total_energy_mj(), 0.0);
        assert_eq!(est.peak_memory_bytes(), 100);
    }

    #[test]
    fn test_energy_accumulates_from_cpu_delta() {
        let probe = ScriptedProbe::new(&secs(&[10, 12]), &[], ThermalState::Nominal);
        let config = EnergyConfig::default().with_base_rate_mw(1000.0);
        let mut est = EnergyEstimator::new(Box::new(probe), config);
        est.start();
        est.record_sample();
        // 2 CPU-seconds at 1000 mW nominal = 2000 mJ
        assert!((est.total_energy_mj() - 2000.0).abs() < 1e-9);
        assert_eq!(est.cpu_time(), Duration::from_secs(2));
    }

    #[test]
    fn test_thermal_multiplier_scales_energy() {
        let probe = ScriptedProbe::new(&secs(&[0, 1]), &[], ThermalState::Critical);
        let config = EnergyConfig::default().with_base_rate_mw(1000.0);
        let mut est = EnergyEstimator::new(Box::new(probe), config);
        est.start();
        est.record_sample();
        assert!((est.total_energy_mj() - 2000.0).abs() < 1e-9);
        assert_eq!(est.samples()[1].thermal, ThermalState::Critical);
    }

    #[test]
    fn test_record_sample_idempotent_with_no_elapsed_cpu() {
        let probe = ScriptedProbe::new(&secs(&[5]), &[], ThermalState::Nominal);
        let mut est = EnergyEstimator::new(Box::new(probe), EnergyConfig::default());
        est.start();
        est.record_sample();
        est.record_sample();
        let samples = est.samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].cumulative_mj, samples[2].cumulative_mj);
    }

    #[test]
    fn test_negative_cpu_delta_clamped_to_zero() {
        // Readings go backwards: 10s then 7s. The delta must not subtract.
        let probe = ScriptedProbe::new(&secs(&[10, 7, 11]), &[], ThermalState::Nominal);
        let config = EnergyConfig::default().with_base_rate_mw(1000.0);
        let mut est = EnergyEstimator::new(Box::new(probe), config);
        est.start();
        est.record_sample();
        assert_eq!(est.total_energy_mj(), 0.0);
        est.record_sample();
        // Forward again: 11s - 10s = 1s
        assert!((est.total_energy_mj() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_sequence_is_monotone() {
        let probe = ScriptedProbe::new(
            &secs(&[0, 3, 1, 4, 2, 9]),
            &[],
            ThermalState::Fair,
        );
        let mut est = EnergyEstimator::new(Box::new(probe), EnergyConfig::default());
        est.start();
        for _ in 0..5 {
            est.record_sample();
        }
        let samples = est.samples();
        for pair in samples.windows(2) {
            assert!(pair[1].cumulative_mj >= pair[0].cumulative_mj);
        }
    }

    #[test]
    fn test_missing_readings_degrade_to_zero() {
        let mut est = EnergyEstimator::new(Box::new(ScriptedProbe::empty()), EnergyConfig::default());
        est.start();
        est.record_sample();
        est.stop();
        assert_eq!(est.total_energy_mj(), 0.0);
        assert_eq!(est.peak_memory_bytes(), 0);
        assert_eq!(est.cpu_time(), Duration::ZERO);
        assert_eq!(est.samples().len(), 3);
    }

    #[test]
    fn test_peak_memory_is_streaming_max() {
        let probe = ScriptedProbe::new(&[], &[50, 300, 120], ThermalState::Nominal);
        let mut est = EnergyEstimator::new(Box::new(probe), EnergyConfig::default());
        est.start();
        est.sample_memory();
        est.sample_memory();
        assert_eq!(est.peak_memory_bytes(), 300);
    }

    #[test]
    fn test_rusage_probe_reads_something_on_unix() {
        let probe = RusageProbe::new();
        #[cfg(target_family = "unix")]
        {
            // Burn a little CPU so the reading is nonzero on fast machines.
            let mut acc = 0u64;
            for i in 0..100_000u64 {
                acc = acc.wrapping_add(i * i);
            }
            assert!(acc > 0);
            assert!(probe.cpu_time().is_some());
        }
        assert_eq!(probe.thermal_state(), ThermalState::Nominal);
    }

    #[test]
    fn test_thermal_multipliers_ordered() {
        assert!(ThermalState::Nominal.multiplier() < ThermalState::Fair.multiplier());
        assert!(ThermalState::Fair.multiplier() < ThermalState::Serious.multiplier());
        assert!(ThermalState::Serious.multiplier() < ThermalState::Critical.multiplier());
    }
}
