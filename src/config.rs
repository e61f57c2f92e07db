use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::optimizer::{Algorithm, PackingConfig};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(env_string)
    }

    /// Creates a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api: ApiConfig::from_lookup(&lookup),
            optimizer: OptimizerConfig::from_lookup(&lookup),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const HOST_VAR: &'static str = "BOXFIT_API_HOST";
    const PORT_VAR: &'static str = "BOXFIT_API_PORT";
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let (bind_ip, display_host) = match lookup(Self::HOST_VAR) {
            Some(raw) => match raw.parse::<IpAddr>() {
                Ok(ip) => (ip, raw),
                Err(err) => {
                    log::warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::HOST_VAR,
                        raw,
                        err,
                        Self::DEFAULT_HOST
                    );
                    (Self::DEFAULT_IP, Self::DEFAULT_HOST.to_string())
                }
            },
            None => (Self::DEFAULT_IP, Self::DEFAULT_HOST.to_string()),
        };

        let port = match lookup(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    log::warn!("{} must not be 0. Using {}.", Self::PORT_VAR, Self::DEFAULT_PORT);
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    log::warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Defaults and tolerances for packing requests served by the API.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
    default_algorithm: Algorithm,
    assign_colors: bool,
}

impl OptimizerConfig {
    const GENERAL_EPSILON_VAR: &'static str = "BOXFIT_PACKING_GENERAL_EPSILON";
    const SUPPORT_EPSILON_VAR: &'static str = "BOXFIT_PACKING_SUPPORT_EPSILON";
    const STABILITY_RATIO_VAR: &'static str = "BOXFIT_PACKING_STABILITY_RATIO";
    const SURFACE_WEIGHT_VAR: &'static str = "BOXFIT_PACKING_SURFACE_WEIGHT";
    const ALGORITHM_VAR: &'static str = "BOXFIT_DEFAULT_ALGORITHM";
    const ASSIGN_COLORS_VAR: &'static str = "BOXFIT_ASSIGN_COLORS";

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let general_epsilon = load_f64_with_warning(
            lookup,
            Self::GENERAL_EPSILON_VAR,
            PackingConfig::DEFAULT_GENERAL_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted tolerances may cause numerical instabilities",
        );

        let support_epsilon = load_f64_with_warning(
            lookup,
            Self::SUPPORT_EPSILON_VAR,
            PackingConfig::DEFAULT_SUPPORT_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted support tolerance may accept floating boxes",
        );

        let stability_ratio = load_f64_with_warning(
            lookup,
            Self::STABILITY_RATIO_VAR,
            PackingConfig::DEFAULT_STABILITY_RATIO,
            |value| (0.0..=0.5).contains(&value),
            "must be between 0 and 0.5",
            "Adjusted stability ratio changes which loads count as stable",
        );

        let surface_weight = load_f64_with_warning(
            lookup,
            Self::SURFACE_WEIGHT_VAR,
            PackingConfig::DEFAULT_SURFACE_WEIGHT,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted surface weight changes best-fit placements",
        );

        let default_algorithm = match lookup(Self::ALGORITHM_VAR) {
            Some(raw) => raw.parse::<Algorithm>().unwrap_or_else(|err| {
                log::warn!("{} is invalid: {}. Using {}.", Self::ALGORITHM_VAR, err, Algorithm::default());
                Algorithm::default()
            }),
            None => Algorithm::default(),
        };

        let assign_colors = lookup(Self::ASSIGN_COLORS_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ASSIGN_COLORS_VAR))
            .unwrap_or(true);

        let packing = PackingConfig::builder()
            .general_epsilon(general_epsilon)
            .support_epsilon(support_epsilon)
            .stability_ratio(stability_ratio)
            .surface_weight(surface_weight)
            .build();

        Self {
            packing,
            default_algorithm,
            assign_colors,
        }
    }

    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Algorithm used when a request does not name one.
    pub fn default_algorithm(&self) -> Algorithm {
        self.default_algorithm
    }

    /// Whether boxes without a color get one from the default palette.
    pub fn assign_colors(&self) -> bool {
        self.assign_colors
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::from_lookup(&|_: &str| None)
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            log::warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            log::warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match lookup(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                // "inf" and "NaN" parse as f64 but are never usable tolerances
                if !value.is_finite() || !validator(value) {
                    log::warn!(
                        "{} contains invalid value '{}': {}. Using {}.",
                        var_name,
                        raw,
                        invalid_hint,
                        default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        log::warn!("{} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                log::warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}
