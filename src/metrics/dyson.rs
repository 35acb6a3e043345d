//! Dyson state → metric updates
//!
//! Unit conversions and V1/V2 compatibility rules live here so every fan
//! generation exports the same metric families:
//!
//! - temperatures arrive in kelvin (heat target in decikelvin)
//! - V1 filter life is in hours and is exported in seconds
//! - V2 VOC/NOx are reported on [0, 100] and rescaled to V1's [0, 10]
//! - fan mode, power and auto mode are synthesised across generations

use super::registry::{MetricDesc, MetricUpdate};
use crate::device::{
    DeviceInfo, DeviceState, EnvironmentState, EnvironmentV1, EnvironmentV2, FanState, FanV1,
    FanV2, HeatV1, HeatV2, VendorValue,
};

/// Dyson uses this rounded offset rather than 273.15
pub const KELVIN_TO_CELSIUS: f64 = -273.0;

const ON_OFF: &[&str] = &["ON", "OFF"];
const FAN_MODES: &[&str] = &["AUTO", "FAN", "OFF"];
const FAN_STATES: &[&str] = &["FAN", "OFF"];
const HEAT_STATES: &[&str] = &["HEAT", "OFF"];
const OSCILLATION_STATES: &[&str] = &["ON", "OFF", "IDLE"];

// Environmental sensors
pub const HUMIDITY: &str = "dyson_humidity_percent";
pub const TEMPERATURE: &str = "dyson_temperature_celsius";
pub const VOC: &str = "dyson_volatile_organic_compounds_units";
pub const DUST: &str = "dyson_dust_units";
pub const PM25: &str = "dyson_pm25_units";
pub const PM10: &str = "dyson_pm10_units";
pub const NOX: &str = "dyson_nitrogen_oxide_units";

// Operational state
pub const FAN_MODE: &str = "dyson_fan_mode";
pub const FAN_POWER: &str = "dyson_fan_power_mode";
pub const AUTO_MODE: &str = "dyson_fan_auto_mode";
pub const FAN_STATE: &str = "dyson_fan_state";
pub const FAN_SPEED: &str = "dyson_fan_speed_units";
pub const OSCILLATION: &str = "dyson_oscillation_mode";
pub const OSCILLATION_STATE: &str = "dyson_oscillation_state";
pub const NIGHT_MODE: &str = "dyson_night_mode";
pub const HEAT_MODE: &str = "dyson_heat_mode";
pub const HEAT_STATE: &str = "dyson_heat_state";
pub const HEAT_TARGET: &str = "dyson_heat_target_celsius";
pub const FOCUS_MODE: &str = "dyson_focus_mode";
pub const QUALITY_TARGET: &str = "dyson_quality_target_units";
pub const FILTER_LIFE: &str = "dyson_filter_life_seconds";
pub const CONTINUOUS_MONITORING: &str = "dyson_continuous_monitoring_mode";
pub const CARBON_FILTER_LIFE: &str = "dyson_carbon_filter_life_percent";
pub const HEPA_FILTER_LIFE: &str = "dyson_hepa_filter_life_percent";
pub const NIGHT_MODE_SPEED: &str = "dyson_night_mode_fan_speed_units";
pub const OSCILLATION_ANGLE_LOW: &str = "dyson_oscillation_angle_low_degrees";
pub const OSCILLATION_ANGLE_HIGH: &str = "dyson_oscillation_angle_high_degrees";
pub const FRONT_DIRECTION: &str = "dyson_front_direction_mode";

const fn desc(name: &'static str, help: &'static str) -> MetricDesc {
    MetricDesc { name, help }
}

/// Help text for every family `translate` can produce
pub const CATALOGUE: &[MetricDesc] = &[
    desc(HUMIDITY, "Relative humidity (percentage)"),
    desc(TEMPERATURE, "Ambient temperature (celsius)"),
    desc(VOC, "Level of Volatile organic compounds"),
    desc(DUST, "Level of Dust (V1 units only)"),
    desc(PM25, "Level of PM2.5 particulate matter (V2 units only)"),
    desc(PM10, "Level of PM10 particulate matter (V2 units only)"),
    desc(NOX, "Level of nitrogen oxides (NOx, V2 units only)"),
    desc(FAN_MODE, "Current mode of the fan"),
    desc(FAN_POWER, "Current power mode of the fan (like fan_mode but binary)"),
    desc(AUTO_MODE, "Current auto mode of the fan (like fan_mode but binary)"),
    desc(FAN_STATE, "Current running state of the fan"),
    desc(FAN_SPEED, "Current speed of fan (-1 = AUTO)"),
    desc(OSCILLATION, "Current oscillation mode (will the fan move?)"),
    desc(OSCILLATION_STATE, "Current oscillation state (is the fan moving?)"),
    desc(NIGHT_MODE, "Night mode"),
    desc(HEAT_MODE, "Current heat mode"),
    desc(HEAT_STATE, "Current heat state"),
    desc(HEAT_TARGET, "Heat target temperature (celsius)"),
    desc(FOCUS_MODE, "Current focus mode (V1 units only)"),
    desc(QUALITY_TARGET, "Quality target for fan (V1 units only)"),
    desc(FILTER_LIFE, "Remaining HEPA filter life (seconds, V1 units only)"),
    desc(CONTINUOUS_MONITORING, "Monitor air quality continuously (V2 units only)"),
    desc(CARBON_FILTER_LIFE, "Percent remaining of carbon filter (V2 units only)"),
    desc(HEPA_FILTER_LIFE, "Percent remaining of HEPA filter (V2 units only)"),
    desc(NIGHT_MODE_SPEED, "Night mode fan speed (V2 units only)"),
    desc(OSCILLATION_ANGLE_LOW, "Low oscillation angle (V2 units only)"),
    desc(OSCILLATION_ANGLE_HIGH, "High oscillation angle (V2 units only)"),
    desc(FRONT_DIRECTION, "Airflow direction from front (V2 units only)"),
];

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Translate one device snapshot into registry updates
pub fn translate(device: &DeviceInfo, state: &DeviceState) -> Vec<MetricUpdate> {
    let mut updates = Updates::new(device);

    match &state.environment {
        Some(EnvironmentState::V1(env)) => updates.environment_v1(env),
        Some(EnvironmentState::V2(env)) => updates.environment_v2(env),
        None => {}
    }

    match &state.fan {
        Some(FanState::V1(fan)) => updates.fan_v1(fan),
        Some(FanState::V2(fan)) => updates.fan_v2(fan),
        None => {}
    }

    updates.finish()
}

/// Collects updates for one device, warning about values it has to drop
struct Updates<'a> {
    device: &'a DeviceInfo,
    out: Vec<MetricUpdate>,
}

impl<'a> Updates<'a> {
    fn new(device: &'a DeviceInfo) -> Self {
        Self {
            device,
            out: Vec::new(),
        }
    }

    fn finish(self) -> Vec<MetricUpdate> {
        self.out
    }

    fn gauge(&mut self, name: &'static str, unit: &'static str, value: f64) {
        self.out.push(MetricUpdate::Gauge { name, unit, value });
    }

    /// Parse a vendor number and push it through `convert`; unparsable values are dropped
    fn gauge_with(
        &mut self,
        name: &'static str,
        unit: &'static str,
        raw: &Option<VendorValue>,
        convert: impl Fn(f64) -> f64,
    ) {
        let Some(raw) = raw else { return };
        match raw.as_f64() {
            Some(value) => self.gauge(name, unit, convert(value)),
            None => tracing::warn!(
                "Received unparsable {} from \"{}\" (serial={}): {:?}; ignoring",
                name,
                self.device.name,
                self.device.serial,
                raw
            ),
        }
    }

    fn raw_gauge(&mut self, name: &'static str, unit: &'static str, raw: &Option<VendorValue>) {
        self.gauge_with(name, unit, raw, |v| v);
    }

    fn state(&mut self, name: &'static str, states: &'static [&'static str], value: Option<&str>) {
        let Some(value) = value.map(str::trim) else { return };
        if states.contains(&value) {
            self.out.push(MetricUpdate::State {
                name,
                states,
                current: value.to_string(),
            });
        } else {
            tracing::warn!(
                "Received unknown {} from \"{}\" (serial={}): {:?}; ignoring",
                name,
                self.device.name,
                self.device.serial,
                value
            );
        }
    }

    fn environment_common(
        &mut self,
        humidity: &Option<VendorValue>,
        temperature: &Option<VendorValue>,
    ) {
        self.raw_gauge(HUMIDITY, "percent", humidity);
        self.gauge_with(TEMPERATURE, "celsius", temperature, |k| {
            round1(k + KELVIN_TO_CELSIUS)
        });
    }

    fn environment_v1(&mut self, env: &EnvironmentV1) {
        self.environment_common(&env.humidity, &env.temperature);
        self.raw_gauge(DUST, "units", &env.dust);
        self.raw_gauge(VOC, "units", &env.volatile_organic_compounds);
    }

    fn environment_v2(&mut self, env: &EnvironmentV2) {
        self.environment_common(&env.humidity, &env.temperature);
        self.raw_gauge(PM25, "units", &env.particulate_matter_25);
        self.raw_gauge(PM10, "units", &env.particulate_matter_10);

        // V2 reports [0, 100]; keep the V1 range
        self.gauge_with(VOC, "units", &env.volatile_organic_compounds, |v| v / 10.0);
        self.gauge_with(NOX, "units", &env.nitrogen_dioxide, |v| v / 10.0);
    }

    fn fan_common(
        &mut self,
        fan_state: Option<&str>,
        night_mode: Option<&str>,
        speed: &Option<VendorValue>,
    ) {
        self.state(FAN_STATE, FAN_STATES, fan_state);
        self.state(NIGHT_MODE, ON_OFF, night_mode);

        // The API reports "AUTO" instead of a number in automatic mode
        match speed {
            Some(raw) if raw.as_text().eq_ignore_ascii_case("AUTO") => {
                self.gauge(FAN_SPEED, "units", -1.0)
            }
            _ => self.raw_gauge(FAN_SPEED, "units", speed),
        }
    }

    fn heat_common(
        &mut self,
        heat_mode: Option<&str>,
        heat_state: Option<&str>,
        target: &Option<VendorValue>,
    ) {
        self.state(HEAT_MODE, HEAT_STATES, heat_mode);
        self.state(HEAT_STATE, HEAT_STATES, heat_state);
        self.gauge_with(HEAT_TARGET, "celsius", target, |dk| {
            round1(dk / 10.0 + KELVIN_TO_CELSIUS)
        });
    }

    fn fan_v1(&mut self, fan: &FanV1) {
        let fan_mode = fan.fan_mode.as_deref().map(str::trim);
        let fan_state = fan.fan_state.as_deref().map(str::trim);
        let oscillation = fan.oscillation.as_deref().map(str::trim);

        self.fan_common(fan_state, fan.night_mode.as_deref(), &fan.speed);
        self.state(FAN_MODE, FAN_MODES, fan_mode);
        self.raw_gauge(QUALITY_TARGET, "units", &fan.quality_target);

        // Synthesise the V2-only binary modes
        if let Some(mode) = fan_mode.filter(|m| FAN_MODES.contains(m)) {
            let auto = if mode == "AUTO" { "ON" } else { "OFF" };
            let power = if mode == "AUTO" || mode == "FAN" { "ON" } else { "OFF" };
            self.state(AUTO_MODE, ON_OFF, Some(auto));
            self.state(FAN_POWER, ON_OFF, Some(power));
        }

        self.state(OSCILLATION, ON_OFF, oscillation);
        // V2 reports IDLE when oscillation is on but auto mode has stopped the fan
        let oscillation_state = match (oscillation, fan_mode, fan_state) {
            (Some("ON"), Some("AUTO"), Some("OFF")) => Some("IDLE"),
            _ => oscillation,
        };
        self.state(OSCILLATION_STATE, OSCILLATION_STATES, oscillation_state);

        self.gauge_with(FILTER_LIFE, "seconds", &fan.filter_life, |hours| {
            hours.trunc() * 3600.0
        });

        if let Some(heat) = &fan.heat {
            self.heat_v1(heat);
        }
    }

    fn heat_v1(&mut self, heat: &HeatV1) {
        self.heat_common(
            heat.heat_mode.as_deref(),
            heat.heat_state.as_deref(),
            &heat.heat_target,
        );
        self.state(FOCUS_MODE, ON_OFF, heat.focus_mode.as_deref());
    }

    fn fan_v2(&mut self, fan: &FanV2) {
        let fan_power = fan.fan_power.as_deref().map(str::trim);
        let auto_mode = fan.auto_mode.as_deref().map(str::trim);

        self.fan_common(fan.fan_state.as_deref(), fan.night_mode.as_deref(), &fan.speed);

        // auto_mode only feeds the synthesised fan mode below
        self.state(FAN_POWER, ON_OFF, fan_power);
        self.state(CONTINUOUS_MONITORING, ON_OFF, fan.continuous_monitoring.as_deref());
        self.state(FRONT_DIRECTION, ON_OFF, fan.front_direction.as_deref());

        self.gauge_with(CARBON_FILTER_LIFE, "percent", &fan.carbon_filter_state, f64::trunc);
        self.gauge_with(HEPA_FILTER_LIFE, "percent", &fan.hepa_filter_state, f64::trunc);
        self.gauge_with(NIGHT_MODE_SPEED, "units", &fan.night_mode_speed, f64::trunc);

        // Configured mode may come as OION/OIOF or as ON/OFF
        let oscillation = fan.oscillation.as_deref().map(str::trim).map(|o| match o {
            "OION" => "ON",
            "OIOF" => "OFF",
            other => other,
        });
        self.state(OSCILLATION, ON_OFF, oscillation);
        self.state(OSCILLATION_STATE, OSCILLATION_STATES, fan.oscillation_status.as_deref());
        self.gauge_with(OSCILLATION_ANGLE_LOW, "degrees", &fan.oscillation_angle_low, f64::trunc);
        self.gauge_with(OSCILLATION_ANGLE_HIGH, "degrees", &fan.oscillation_angle_high, f64::trunc);

        // V1-compatible fan mode
        let fan_mode = match (auto_mode, fan_power) {
            (Some("ON"), _) => Some("AUTO"),
            (_, Some("ON")) => Some("FAN"),
            (_, Some("OFF")) => Some("OFF"),
            (_, Some(other)) => {
                tracing::warn!(
                    "Received unknown fan_power setting from \"{}\" (serial={}): {:?}, defaulting to \"OFF\"",
                    self.device.name,
                    self.device.serial,
                    other
                );
                Some("OFF")
            }
            (_, None) => None,
        };
        self.state(FAN_MODE, FAN_MODES, fan_mode);

        if let Some(heat) = &fan.heat {
            self.heat_v2(heat);
        }
    }

    fn heat_v2(&mut self, heat: &HeatV2) {
        self.heat_common(
            heat.heat_mode.as_deref(),
            heat.heat_state.as_deref(),
            &heat.heat_target,
        );
    }
}
