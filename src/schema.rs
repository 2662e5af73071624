//! Layout of the controller's `RF` status frame.
//!
//! The frame is a flat list of comma separated fields, grouped into registers that each start
//! with a two character tag. [`SPANET`] describes the size expectations the parser validates
//! against, and [`for_each_property!`] lists every field the crate understands, relative to the
//! tag of the register it lives in.

/// Register tags in the order the controller emits them.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    strum::EnumCount,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum Register {
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R9,
    RA,
    RB,
    RC,
    RE,
    RG,
}

impl Register {
    pub fn tag(self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Firmware generations that differ in how many registers and fields a frame carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Firmware {
    Legacy,
    Current,
}

impl Firmware {
    /// Classify a version token such as `SW V5 17 05 31`.
    ///
    /// Returns the major version alongside, if one could be found at all. Tokens without a
    /// recognizable major version are treated as legacy.
    pub fn classify(version: &str) -> (Firmware, Option<u32>) {
        let major = version.split_whitespace().find_map(|word| {
            let digits = word.strip_prefix('V')?;
            let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
            digits[..end].parse::<u32>().ok()
        });
        match major {
            Some(major) if major > 2 => (Firmware::Current, Some(major)),
            major => (Firmware::Legacy, major),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RegisterSpec {
    pub register: Register,
    /// Minimum number of fields in the register, tag included.
    pub min_fields: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Thresholds {
    pub registers: usize,
    pub fields: usize,
}

#[derive(Debug)]
pub struct Schema {
    /// The literal first field of every status frame.
    pub prefix: &'static str,
    /// Registers in wire order.
    pub registers: &'static [RegisterSpec],
    pub legacy: Thresholds,
    pub current: Thresholds,
    /// Where the firmware version token lives, if anywhere.
    pub version_field: Option<(Register, usize)>,
    /// Reading this many fields ends the frame regardless of its content.
    pub max_fields: usize,
}

impl Schema {
    pub fn thresholds(&self, firmware: Firmware) -> Thresholds {
        match firmware {
            Firmware::Legacy => self.legacy,
            Firmware::Current => self.current,
        }
    }

    /// Minimum field count for the register at `index` in wire order.
    pub fn min_fields(&self, index: usize) -> Option<usize> {
        self.registers.get(index).map(|r| r.min_fields)
    }

    pub fn is_tag(&self, field: &str) -> Option<Register> {
        let register = field.parse::<Register>().ok()?;
        self.registers.iter().any(|r| r.register == register).then_some(register)
    }
}

pub const STATUS_COMMAND: &str = "RF";

pub static SPANET: Schema = Schema {
    prefix: "RF:",
    registers: &[
        RegisterSpec { register: Register::R2, min_fields: 30 },
        RegisterSpec { register: Register::R3, min_fields: 25 },
        RegisterSpec { register: Register::R4, min_fields: 26 },
        RegisterSpec { register: Register::R5, min_fields: 23 },
        RegisterSpec { register: Register::R6, min_fields: 24 },
        RegisterSpec { register: Register::R7, min_fields: 31 },
        RegisterSpec { register: Register::R9, min_fields: 13 },
        RegisterSpec { register: Register::RA, min_fields: 13 },
        RegisterSpec { register: Register::RB, min_fields: 13 },
        RegisterSpec { register: Register::RC, min_fields: 11 },
        RegisterSpec { register: Register::RE, min_fields: 31 },
        RegisterSpec { register: Register::RG, min_fields: 13 },
    ],
    legacy: Thresholds { registers: 11, fields: 253 },
    current: Thresholds { registers: 12, fields: 275 },
    version_field: Some((Register::R3, 6)),
    max_fields: 300,
};

/// Invoke `$m` with the full property table.
///
/// Every entry reads as `REGISTER + OFFSET [if FIRMWARE] => field: Type = constructor, "Name",
/// "description";`. Identifiers used by the constructors resolve where `$m` expands.
macro_rules! for_each_property {
    ($m:ident) => {
        $m! {
            R2 + 1 => mains_current: RoProperty<i32> = RoProperty::new(int), "MainsCurrent", "Current drawn from the mains (A x10)";
            R2 + 2 => mains_voltage: RoProperty<i32> = RoProperty::new(int), "MainsVoltage", "Mains voltage (V)";
            R2 + 3 => case_temperature: RoProperty<i32> = RoProperty::new(int), "CaseTemperature", "Controller case temperature (C)";
            R2 + 4 => port_current: RoProperty<i32> = RoProperty::new(int), "PortCurrent", "Current drawn by the 12V port (mA)";
            R2 + 5 => spa_day_of_week: RwProperty<i32> = RwProperty::new(int, write("S06", Echo::Value).range(0, 6)), "SpaDayOfWeek", "Day of the week on the spa clock, Monday is 0";
            R2 + 12 => heater_temperature: RoProperty<i32> = RoProperty::new(int), "HeaterTemperature", "Heater temperature (C x10)";
            R2 + 13 => pool_temperature: RoProperty<i32> = RoProperty::new(int), "PoolTemperature", "Pool temperature (C x10)";
            R2 + 14 => water_present: RoProperty<bool> = RoProperty::new(flag), "WaterPresent", "Water is detected at the heater";
            R2 + 16 => awake_minutes_remaining: RoProperty<i32> = RoProperty::new(int), "AwakeMinutesRemaining", "";
            R2 + 17 => filt_pump_run_time_total: RoProperty<i32> = RoProperty::new(int), "FiltPumpRunTimeTotal", "Filtration pump run time today (minutes)";
            R2 + 18 => filt_pump_req_mins: RoProperty<i32> = RoProperty::new(int), "FiltPumpReqMins", "Filtration minutes required today";
            R2 + 19 => load_time_out: RoProperty<i32> = RoProperty::new(int), "LoadTimeOut", "Load shedding time out";
            R2 + 20 => hour_meter: RoProperty<i32> = RoProperty::new(int), "HourMeter", "Controller run hours";
            R2 + 21 => relay1: RoProperty<i32> = RoProperty::new(int), "Relay1", "Relay 1 switch count";
            R2 + 22 => relay2: RoProperty<i32> = RoProperty::new(int), "Relay2", "Relay 2 switch count";
            R2 + 23 => relay3: RoProperty<i32> = RoProperty::new(int), "Relay3", "Relay 3 switch count";
            R2 + 24 => relay4: RoProperty<i32> = RoProperty::new(int), "Relay4", "Relay 4 switch count";
            R2 + 25 => relay5: RoProperty<i32> = RoProperty::new(int), "Relay5", "Relay 5 switch count";
            R2 + 26 => relay6: RoProperty<i32> = RoProperty::new(int), "Relay6", "Relay 6 switch count";
            R2 + 27 => relay7: RoProperty<i32> = RoProperty::new(int), "Relay7", "Relay 7 switch count";
            R2 + 28 => relay8: RoProperty<i32> = RoProperty::new(int), "Relay8", "Relay 8 switch count";
            R2 + 29 => relay9: RoProperty<i32> = RoProperty::new(int), "Relay9", "Relay 9 switch count";

            R3 + 1 => clmt: RoProperty<i32> = RoProperty::new(int), "CLMT", "Current limit (A)";
            R3 + 2 => phse: RoProperty<i32> = RoProperty::new(int), "PHSE", "Number of supply phases";
            R3 + 3 => llm1: RoProperty<i32> = RoProperty::new(int), "LLM1", "Load limit, phase 1";
            R3 + 4 => llm2: RoProperty<i32> = RoProperty::new(int), "LLM2", "Load limit, phase 2";
            R3 + 5 => llm3: RoProperty<i32> = RoProperty::new(int), "LLM3", "Load limit, phase 3";
            R3 + 6 => sver: RoProperty<String> = RoProperty::new(text), "SVER", "Controller firmware version";
            R3 + 7 => model: RoProperty<String> = RoProperty::new(text), "Model", "Controller model";
            R3 + 8 => serial_no1: RoProperty<String> = RoProperty::new(text), "SerialNo1", "Serial number, first part";
            R3 + 9 => serial_no2: RoProperty<String> = RoProperty::new(text), "SerialNo2", "Serial number, second part";
            R3 + 10 => d1: RoProperty<bool> = RoProperty::new(flag), "D1", "DIP switch 1";
            R3 + 11 => d2: RoProperty<bool> = RoProperty::new(flag), "D2", "DIP switch 2";
            R3 + 12 => d3: RoProperty<bool> = RoProperty::new(flag), "D3", "DIP switch 3";
            R3 + 13 => d4: RoProperty<bool> = RoProperty::new(flag), "D4", "DIP switch 4";
            R3 + 14 => d5: RoProperty<bool> = RoProperty::new(flag), "D5", "DIP switch 5";
            R3 + 15 => d6: RoProperty<bool> = RoProperty::new(flag), "D6", "DIP switch 6";
            R3 + 16 => pump: RoProperty<String> = RoProperty::new(text), "Pump", "Pump configuration";
            R3 + 17 => ls: RoProperty<i32> = RoProperty::new(int), "LS", "Load shed level";
            R3 + 18 => hv: RoProperty<bool> = RoProperty::new(flag), "HV", "";
            R3 + 19 => snp_mr: RoProperty<i32> = RoProperty::new(int), "SnpMR", "";
            R3 + 20 => status: RoProperty<String> = RoProperty::new(text), "Status", "Controller status word";
            R3 + 21 => prime_count: RoProperty<i32> = RoProperty::new(int), "PrimeCount", "Priming cycles remaining";
            R3 + 22 => ec: RoProperty<i32> = RoProperty::new(int), "EC", "Element current (A x10)";
            R3 + 23 => hamb: RoProperty<i32> = RoProperty::new(int), "HAMB", "";
            R3 + 24 => hcon: RoProperty<i32> = RoProperty::new(int), "HCON", "";

            R4 + 1 => mode: RwProperty<SpaMode> = RwProperty::new(mode, write("W66", Echo::Value)), "Mode", "Operating mode (NORM, ECON, AWAY or WEEK)";
            R4 + 2 => ser1_timer: RoProperty<i32> = RoProperty::new(int), "Ser1_Timer", "Service timer 1";
            R4 + 3 => ser2_timer: RoProperty<i32> = RoProperty::new(int), "Ser2_Timer", "Service timer 2";
            R4 + 4 => ser3_timer: RoProperty<i32> = RoProperty::new(int), "Ser3_Timer", "Service timer 3";
            R4 + 5 => heat_mode: RoProperty<i32> = RoProperty::new(int), "HeatMode", "";
            R4 + 6 => pump_idle_timer: RoProperty<i32> = RoProperty::new(int), "PumpIdleTimer", "";
            R4 + 7 => pump_run_timer: RoProperty<i32> = RoProperty::new(int), "PumpRunTimer", "";
            R4 + 8 => adt_pool_hys: RoProperty<i32> = RoProperty::new(int), "AdtPoolHys", "Pool temperature hysteresis";
            R4 + 9 => adt_heater_hys: RoProperty<i32> = RoProperty::new(int), "AdtHeaterHys", "Heater temperature hysteresis";
            R4 + 10 => power: RoProperty<i32> = RoProperty::new(int), "Power", "Instantaneous power draw (W)";
            R4 + 11 => power_kwh: RoProperty<i32> = RoProperty::new(int), "Power_kWh", "Energy used in total (kWh)";
            R4 + 12 => power_today: RoProperty<i32> = RoProperty::new(int), "Power_Today", "Energy used today";
            R4 + 13 => power_yesterday: RoProperty<i32> = RoProperty::new(int), "Power_Yesterday", "Energy used yesterday";
            R4 + 14 => thermal_cut_out: RoProperty<i32> = RoProperty::new(int), "ThermalCutOut", "";
            R4 + 15 => test_d1: RoProperty<i32> = RoProperty::new(int), "Test_D1", "";
            R4 + 16 => test_d2: RoProperty<i32> = RoProperty::new(int), "Test_D2", "";
            R4 + 17 => test_d3: RoProperty<i32> = RoProperty::new(int), "Test_D3", "";
            R4 + 18 => element_heat_source_offset: RoProperty<i32> = RoProperty::new(int), "ElementHeatSourceOffset", "";
            R4 + 19 => frequency: RoProperty<i32> = RoProperty::new(int), "Frequency", "Mains frequency (Hz)";
            R4 + 20 => hp_heat_source_offset_heat: RoProperty<i32> = RoProperty::new(int), "HPHeatSourceOffset_Heat", "";
            R4 + 21 => hp_heat_source_offset_cool: RoProperty<i32> = RoProperty::new(int), "HPHeatSourceOffset_Cool", "";
            R4 + 22 => heat_source_off_time: RoProperty<i32> = RoProperty::new(int), "HeatSourceOffTime", "";
            R4 + 23 => vari_mode: RoProperty<i32> = RoProperty::new(int), "Vari_Mode", "Variable speed pump mode";
            R4 + 24 => vari_speed: RoProperty<i32> = RoProperty::new(int), "Vari_Speed", "Variable speed pump speed";
            R4 + 25 => vari_percent: RoProperty<i32> = RoProperty::new(int), "Vari_Percent", "Variable speed pump speed (%)";

            R5 + 10 => sleeping: RoProperty<bool> = RoProperty::new(flag), "RB_TP_Sleep", "Spa is in a sleep period";
            R5 + 11 => ozone: RoProperty<bool> = RoProperty::new(flag), "RB_TP_Ozone", "Ozone generator is running";
            R5 + 12 => heater: RoProperty<bool> = RoProperty::new(flag), "RB_TP_Heater", "Heater is running";
            R5 + 13 => auto: RoProperty<bool> = RoProperty::new(flag), "RB_TP_Auto", "";
            R5 + 14 => light: RwProperty<bool> = RwProperty::new(flag, write("W14", Echo::Literal("W14")).toggle()), "RB_TP_Light", "Lights are on";
            R5 + 15 => water_temperature: RoProperty<i32> = RoProperty::new(int), "WTMP", "Water temperature (C x10)";
            R5 + 16 => clean_cycle: RoProperty<bool> = RoProperty::new(flag), "CleanCycle", "Clean cycle is running";

            R6 + 1 => vari_value: RwProperty<i32> = RwProperty::new(int, write("S13", Echo::ValueThen("  S13")).range(1, 5)), "VARIValue", "Variable speed pump speed setting";
            R6 + 2 => light_brightness: RwProperty<i32> = RwProperty::new(int, write("S08", Echo::Value).range(1, 5)), "LBRTValue", "Light brightness";
            R6 + 3 => light_colour: RwProperty<i32> = RwProperty::new(int, write("S10", Echo::Value).range(0, 31)), "CurrClr", "Light colour";
            R6 + 4 => light_mode: RwProperty<i32> = RwProperty::new(int, write("S07", Echo::Value).range(0, 4)).labels(LIGHT_MODES), "ColorMode", "Light effect";
            R6 + 5 => light_speed: RwProperty<i32> = RwProperty::new(int, write("S09", Echo::Value).range(1, 5)), "LSPDValue", "Light effect speed";
            R6 + 6 => filtration_hours: RwProperty<i32> = RwProperty::new(int, write("W60", Echo::Value).range(1, 24)), "FiltHrs", "Filtration hours per day";
            R6 + 7 => filtration_block: RwProperty<i32> = RwProperty::new(int, write("W90", Echo::Value).one_of(&[1, 2, 3, 4, 6, 8, 12, 24])), "FiltBlockHrs", "Filtration block length (hours)";
            R6 + 8 => set_temperature: RwProperty<i32> = RwProperty::new(int, write("W40", Echo::Value).range(50, 410).step(2)), "STMP", "Target water temperature (C x10)";
            R6 + 9 => clock_24h: RoProperty<bool> = RoProperty::new(flag), "L_24HOURS", "Display uses a 24 hour clock";
            R6 + 10 => power_save_level: RoProperty<i32> = RoProperty::new(int), "PSAV_LVL", "Power save level";
            R6 + 11 => power_save_begin: RoProperty<i32> = RoProperty::new(int), "PSAV_BGN", "Power save start (h*256+m)";
            R6 + 12 => power_save_end: RoProperty<i32> = RoProperty::new(int), "PSAV_END", "Power save end (h*256+m)";
            R6 + 13 => sleep1_days: RwProperty<i32> = RwProperty::new(int, write("W67", Echo::Value).labelled()).labels(SLEEP_DAYS), "L_1SNZ_DAY", "Sleep timer 1 days";
            R6 + 14 => sleep2_days: RwProperty<i32> = RwProperty::new(int, write("W70", Echo::Value).labelled()).labels(SLEEP_DAYS), "L_2SNZ_DAY", "Sleep timer 2 days";
            R6 + 15 => sleep1_begin: RwProperty<i32> = RwProperty::new(int, write("W68", Echo::Value).time_of_day()), "L_1SNZ_BGN", "Sleep timer 1 start (h*256+m)";
            R6 + 16 => sleep2_begin: RwProperty<i32> = RwProperty::new(int, write("W71", Echo::Value).time_of_day()), "L_2SNZ_BGN", "Sleep timer 2 start (h*256+m)";
            R6 + 17 => sleep1_end: RwProperty<i32> = RwProperty::new(int, write("W69", Echo::Value).time_of_day()), "L_1SNZ_END", "Sleep timer 1 end (h*256+m)";
            R6 + 18 => sleep2_end: RwProperty<i32> = RwProperty::new(int, write("W72", Echo::Value).time_of_day()), "L_2SNZ_END", "Sleep timer 2 end (h*256+m)";
            R6 + 19 => default_screen: RoProperty<i32> = RoProperty::new(int), "DefaultScrn", "";
            R6 + 20 => time_out: RoProperty<i32> = RoProperty::new(int), "TOUT", "Pump time out (minutes)";
            R6 + 21 => vpmp: RoProperty<bool> = RoProperty::new(flag), "VPMP", "";
            R6 + 22 => hifi: RoProperty<bool> = RoProperty::new(flag), "HIFI", "";
            R6 + 23 => brand: RoProperty<i32> = RoProperty::new(int), "BRND", "";
            R6 + 24 if Current => prme: RoProperty<i32> = RoProperty::new(int), "PRME", "";
            R6 + 25 if Current => elmt: RoProperty<i32> = RoProperty::new(int), "ELMT", "";
            R6 + 26 if Current => spa_type: RoProperty<i32> = RoProperty::new(int), "TYPE", "";
            R6 + 27 if Current => gas: RoProperty<i32> = RoProperty::new(int), "GAS", "";

            R7 + 1 => clean_time: RoProperty<i32> = RoProperty::new(int), "WCLNTime", "Clean cycle start time";
            R7 + 2 => ozone_off: RoProperty<bool> = RoProperty::new(flag), "OzoneOff", "";
            R7 + 3 => fahrenheit: RoProperty<bool> = RoProperty::new(flag), "TemperatureUnits", "Display shows Fahrenheit";
            R7 + 4 => ozone_24h: RoProperty<bool> = RoProperty::new(flag), "Ozone24", "";
            R7 + 5 => cjet: RoProperty<bool> = RoProperty::new(flag), "CJET", "";
            R7 + 6 => circulation_24h: RoProperty<bool> = RoProperty::new(flag), "Circ24", "";
            R7 + 7 => vele: RoProperty<bool> = RoProperty::new(flag), "VELE", "";
            R7 + 11 => v_max: RoProperty<i32> = RoProperty::new(int), "V_Max", "Highest mains voltage seen";
            R7 + 12 => v_min: RoProperty<i32> = RoProperty::new(int), "V_Min", "Lowest mains voltage seen";
            R7 + 13 => v_max_24: RoProperty<i32> = RoProperty::new(int), "V_Max_24", "Highest mains voltage in the last 24 hours";
            R7 + 14 => v_min_24: RoProperty<i32> = RoProperty::new(int), "V_Min_24", "Lowest mains voltage in the last 24 hours";
            R7 + 15 => current_zero: RoProperty<i32> = RoProperty::new(int), "CurrentZero", "";
            R7 + 16 => current_adjust: RoProperty<i32> = RoProperty::new(int), "CurrentAdjust", "";
            R7 + 17 => voltage_adjust: RoProperty<i32> = RoProperty::new(int), "VoltageAdjust", "";
            R7 + 19 => ser1: RoProperty<i32> = RoProperty::new(int), "Ser1", "";
            R7 + 20 => ser2: RoProperty<i32> = RoProperty::new(int), "Ser2", "";
            R7 + 21 => ser3: RoProperty<i32> = RoProperty::new(int), "Ser3", "";
            R7 + 22 => vmax: RoProperty<i32> = RoProperty::new(int), "VMAX", "";
            R7 + 23 => ahys: RoProperty<i32> = RoProperty::new(int), "AHYS", "";
            R7 + 24 => huse: RoProperty<bool> = RoProperty::new(flag), "HUSE", "";
            R7 + 25 => heat_element_boost: RwProperty<bool> = RwProperty::new(flag, write("W98", Echo::Value)), "HELE", "Allow the heating element to assist the heat pump";
            R7 + 26 => heat_pump_mode: RwProperty<i32> = RwProperty::new(int, write("W99", Echo::Value).range(0, 3)).labels(HEAT_PUMP_MODES), "HPMP", "Heat pump mode";
            R7 + 27 => pmin: RoProperty<i32> = RoProperty::new(int), "PMIN", "";
            R7 + 28 => pflt: RoProperty<i32> = RoProperty::new(int), "PFLT", "";
            R7 + 29 => phtr: RoProperty<i32> = RoProperty::new(int), "PHTR", "";
            R7 + 30 => pmax: RoProperty<i32> = RoProperty::new(int), "PMAX", "";

            R9 + 2 => f1_hr: RoProperty<i32> = RoProperty::new(int), "F1_HR", "Fault 1 hour meter reading";
            R9 + 3 => f1_time: RoProperty<i32> = RoProperty::new(int), "F1_Time", "Fault 1 time";
            R9 + 4 => f1_er: RoProperty<i32> = RoProperty::new(int), "F1_ER", "Fault 1 error code";
            R9 + 5 => f1_i: RoProperty<i32> = RoProperty::new(int), "F1_I", "Fault 1 current";
            R9 + 6 => f1_v: RoProperty<i32> = RoProperty::new(int), "F1_V", "Fault 1 voltage";
            R9 + 7 => f1_pt: RoProperty<i32> = RoProperty::new(int), "F1_PT", "Fault 1 pool temperature";
            R9 + 8 => f1_ht: RoProperty<i32> = RoProperty::new(int), "F1_HT", "Fault 1 heater temperature";
            R9 + 9 => f1_ct: RoProperty<i32> = RoProperty::new(int), "F1_CT", "Fault 1 case temperature";
            R9 + 10 => f1_pu: RoProperty<i32> = RoProperty::new(int), "F1_PU", "Fault 1 pump state";
            R9 + 11 => f1_ve: RoProperty<bool> = RoProperty::new(flag), "F1_VE", "";
            R9 + 12 => f1_st: RoProperty<i32> = RoProperty::new(int), "F1_ST", "Fault 1 set temperature";

            RA + 2 => f2_hr: RoProperty<i32> = RoProperty::new(int), "F2_HR", "Fault 2 hour meter reading";
            RA + 3 => f2_time: RoProperty<i32> = RoProperty::new(int), "F2_Time", "Fault 2 time";
            RA + 4 => f2_er: RoProperty<i32> = RoProperty::new(int), "F2_ER", "Fault 2 error code";
            RA + 5 => f2_i: RoProperty<i32> = RoProperty::new(int), "F2_I", "Fault 2 current";
            RA + 6 => f2_v: RoProperty<i32> = RoProperty::new(int), "F2_V", "Fault 2 voltage";
            RA + 7 => f2_pt: RoProperty<i32> = RoProperty::new(int), "F2_PT", "Fault 2 pool temperature";
            RA + 8 => f2_ht: RoProperty<i32> = RoProperty::new(int), "F2_HT", "Fault 2 heater temperature";
            RA + 9 => f2_ct: RoProperty<i32> = RoProperty::new(int), "F2_CT", "Fault 2 case temperature";
            RA + 10 => f2_pu: RoProperty<i32> = RoProperty::new(int), "F2_PU", "Fault 2 pump state";
            RA + 11 => f2_ve: RoProperty<bool> = RoProperty::new(flag), "F2_VE", "";
            RA + 12 => f2_st: RoProperty<i32> = RoProperty::new(int), "F2_ST", "Fault 2 set temperature";

            RB + 2 => f3_hr: RoProperty<i32> = RoProperty::new(int), "F3_HR", "Fault 3 hour meter reading";
            RB + 3 => f3_time: RoProperty<i32> = RoProperty::new(int), "F3_Time", "Fault 3 time";
            RB + 4 => f3_er: RoProperty<i32> = RoProperty::new(int), "F3_ER", "Fault 3 error code";
            RB + 5 => f3_i: RoProperty<i32> = RoProperty::new(int), "F3_I", "Fault 3 current";
            RB + 6 => f3_v: RoProperty<i32> = RoProperty::new(int), "F3_V", "Fault 3 voltage";
            RB + 7 => f3_pt: RoProperty<i32> = RoProperty::new(int), "F3_PT", "Fault 3 pool temperature";
            RB + 8 => f3_ht: RoProperty<i32> = RoProperty::new(int), "F3_HT", "Fault 3 heater temperature";
            RB + 9 => f3_ct: RoProperty<i32> = RoProperty::new(int), "F3_CT", "Fault 3 case temperature";
            RB + 10 => f3_pu: RoProperty<i32> = RoProperty::new(int), "F3_PU", "Fault 3 pump state";
            RB + 11 => f3_ve: RoProperty<bool> = RoProperty::new(flag), "F3_VE", "";
            RB + 12 => f3_st: RoProperty<i32> = RoProperty::new(int), "F3_ST", "Fault 3 set temperature";

            RC + 10 => blower: RwProperty<i32> = RwProperty::new(int, write("S28", Echo::CodeOk).range(0, 2)).labels(BLOWER_MODES), "Outlet_Blower", "Blower mode";

            RE + 1 => hp_present: RoProperty<i32> = RoProperty::new(int), "HP_Present", "A heat pump is connected";
            RE + 10 => hp_ambient: RoProperty<i32> = RoProperty::new(int), "HP_Ambient", "Heat pump ambient temperature (C)";
            RE + 11 => hp_condensor: RoProperty<i32> = RoProperty::new(int), "HP_Condensor", "Heat pump condenser temperature (C)";
            RE + 12 => hp_compressor: RoProperty<bool> = RoProperty::new(flag), "HP_Compressor_State", "";
            RE + 13 => hp_fan: RoProperty<bool> = RoProperty::new(flag), "HP_Fan_State", "";
            RE + 14 => hp_4w_valve: RoProperty<bool> = RoProperty::new(flag), "HP_4W_Valve", "";
            RE + 15 => hp_heater: RoProperty<bool> = RoProperty::new(flag), "HP_Heater_State", "";
            RE + 16 => hp_state: RoProperty<i32> = RoProperty::new(int), "HP_State", "";
            RE + 17 => hp_mode: RoProperty<i32> = RoProperty::new(int), "HP_Mode", "";
            RE + 18 => hp_defrost_timer: RoProperty<i32> = RoProperty::new(int), "HP_Defrost_Timer", "";
            RE + 19 => hp_comp_run_timer: RoProperty<i32> = RoProperty::new(int), "HP_Comp_Run_Timer", "";
            RE + 20 => hp_low_temp_timer: RoProperty<i32> = RoProperty::new(int), "HP_Low_Temp_Timer", "";
            RE + 21 => hp_heat_accum_timer: RoProperty<i32> = RoProperty::new(int), "HP_Heat_Accum_Timer", "";
            RE + 22 => hp_sequence_timer: RoProperty<i32> = RoProperty::new(int), "HP_Sequence_Timer", "";
            RE + 23 => hp_warning: RoProperty<i32> = RoProperty::new(int), "HP_Warning", "";
            RE + 24 => freeze_timer: RoProperty<i32> = RoProperty::new(int), "FrezTmr", "";
            RE + 25 => dbgn: RoProperty<i32> = RoProperty::new(int), "DBGN", "";
            RE + 26 => dend: RoProperty<i32> = RoProperty::new(int), "DEND", "";
            RE + 27 => dcmp: RoProperty<i32> = RoProperty::new(int), "DCMP", "";
            RE + 28 => dmax: RoProperty<i32> = RoProperty::new(int), "DMAX", "";
            RE + 29 => dele: RoProperty<i32> = RoProperty::new(int), "DELE", "";
            RE + 30 => dpmp: RoProperty<i32> = RoProperty::new(int), "DPMP", "";

            RG + 12 => lock_mode: RwProperty<i32> = RwProperty::new(tri_state, write("S21", Echo::Value).range(0, 2)).labels(LOCK_MODES), "LockMode", "Keypad lock";
        }
    };
}
pub(crate) use for_each_property;
