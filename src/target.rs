use std::{env, fmt, mem};

/// Compilation target; decides the machine-word width used for `isz`/`usz`,
/// pointers and function values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BuildTarget {
    #[default]
    Host,
    Triple(String),
}

pub const TARGET_ENV: &str = "PRIME_TARGET";

pub const ESP32C3_TRIPLE: &str = "riscv32imc-unknown-none-elf";
pub const ESP32_XTENSA_TRIPLE: &str = "xtensa-esp32-none-elf";
pub const ESP32_XTENSA_ESPIDF_TRIPLE: &str = "xtensa-esp32-espidf";

const WORD32_TRIPLES: [&str; 3] = [
    ESP32C3_TRIPLE,
    ESP32_XTENSA_TRIPLE,
    ESP32_XTENSA_ESPIDF_TRIPLE,
];

impl BuildTarget {
    pub fn host() -> Self {
        Self::Host
    }

    /// An explicit flag wins over `PRIME_TARGET`; blank values mean host.
    pub fn from_flag_or_env(flag: Option<String>) -> Self {
        Self::from_sources(flag, env::var(TARGET_ENV).ok())
    }

    pub fn from_sources(flag: Option<String>, env_value: Option<String>) -> Self {
        let target = flag
            .or(env_value)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        match target {
            Some(triple) => Self::Triple(triple),
            None => Self::Host,
        }
    }

    pub fn triple(&self) -> Option<&str> {
        match self {
            BuildTarget::Host => None,
            BuildTarget::Triple(triple) => Some(triple),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, BuildTarget::Host)
    }

    pub fn is_embedded(&self) -> bool {
        self.triple()
            .map(|triple| WORD32_TRIPLES.contains(&triple))
            .unwrap_or(false)
    }

    pub fn pointer_width_bits(&self) -> u32 {
        if self.is_embedded() {
            32
        } else {
            (mem::size_of::<usize>() * 8) as u32
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTarget::Host => f.write_str("host"),
            BuildTarget::Triple(triple) => f.write_str(triple),
        }
    }
}
