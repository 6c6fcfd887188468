//! Configuration management for the Trailhead server

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub waiver: WaiverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    /// Per-call timeout for storage operations, in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Waiver signing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WaiverConfig {
    pub calibration: TemplateCalibration,
}

/// Calibration values for a waiver template family.
///
/// The anchor token patterns, the date-underline geometry, and the transform
/// scale factors are all properties of how a particular template was authored.
/// New template layouts get a new calibration, not new code.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateCalibration {
    /// Normalized token text that marks the signature line exactly
    pub signature_token: String,
    /// Normalized token prefix accepted as a fallback signature marker
    pub signature_prefix: String,
    /// Length of the underscore run that renders the date line
    pub date_underscore_len: usize,
    /// Expected (x, y, width) of the date underline, in text-layer units
    pub date_expected_x: f64,
    pub date_expected_y: f64,
    pub date_expected_width: f64,
    /// Tolerance for matching the date underline geometry
    pub date_tolerance: f64,
    /// Horizontal/vertical scale for the signature anchor transform
    pub signature_scale_x: f64,
    pub signature_scale_y: f64,
    /// Horizontal/vertical scale for the date anchor transform
    pub date_scale_x: f64,
    pub date_scale_y: f64,
    /// Scale applied to the signature image relative to its native size
    pub signature_image_scale: f32,
    /// Font size for the overlaid names
    pub name_font_size: f64,
    /// Font size for the overlaid date
    pub date_font_size: f64,
    /// Gap between the signature image and the guardian name line
    pub guardian_name_gap: f64,
    /// Extra gap between the guardian name and the participant name lines
    pub participant_name_gap: f64,
}

impl Default for TemplateCalibration {
    fn default() -> Self {
        TemplateCalibration {
            signature_token: "signature".to_string(),
            signature_prefix: "signa".to_string(),
            date_underscore_len: 23,
            date_expected_x: 30.4,
            date_expected_y: 42.3,
            date_expected_width: 6.3,
            date_tolerance: 0.1,
            signature_scale_x: 2.0,
            signature_scale_y: 2.0,
            date_scale_x: 2.7,
            date_scale_y: 2.05,
            signature_image_scale: 0.35,
            name_font_size: 12.0,
            date_font_size: 12.0,
            guardian_name_gap: 11.0,
            participant_name_gap: 31.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                endpoint: "http://localhost:9000".to_string(),
                bucket: "trailhead".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
                timeout_secs: 30,
            },
            database: DatabaseConfig {
                url: "sqlite:./trailhead.db".to_string(),
            },
            waiver: WaiverConfig {
                calibration: TemplateCalibration::default(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            storage: StorageConfig {
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
                timeout_secs: env::var("S3_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./trailhead.db".to_string()),
            },
            waiver: WaiverConfig {
                calibration: TemplateCalibration::default(),
            },
        })
    }
}
