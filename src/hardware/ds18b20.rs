// src/hardware/ds18b20.rs - DS18B20 one-wire sensor via the w1 sysfs interface
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{SensorError, TemperatureSource};

/// Lowest temperature the DS18B20 can report.
pub const MIN_READING: f64 = -55.0;
/// Highest temperature the DS18B20 can report.
pub const MAX_READING: f64 = 125.0;

/// Reads `<base>/<sensor_id>/w1_slave`, as exposed by the `w1_therm` kernel driver.
#[derive(Debug, Clone)]
pub struct Ds18b20Sensor {
    device_file: PathBuf,
}

impl Ds18b20Sensor {
    pub fn new(w1_base: impl AsRef<Path>, sensor_id: &str) -> Self {
        Self {
            device_file: w1_base.as_ref().join(sensor_id).join("w1_slave"),
        }
    }

    pub fn device_file(&self) -> &Path {
        &self.device_file
    }
}

#[async_trait]
impl TemperatureSource for Ds18b20Sensor {
    async fn read(&self) -> Result<f64, SensorError> {
        let raw = fs::read_to_string(&self.device_file).await?;
        parse_w1_slave(&raw)
    }
}

/// Parse the two-line `w1_slave` output:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(raw: &str) -> Result<f64, SensorError> {
    let mut lines = raw.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed("empty output".to_string()))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::CrcMismatch);
    }

    let data_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed("missing temperature line".to_string()))?;
    let (_, millis) = data_line
        .rsplit_once("t=")
        .ok_or_else(|| SensorError::Malformed(format!("no t= field in '{}'", data_line.trim())))?;
    let millis: i64 = millis
        .trim()
        .parse()
        .map_err(|e| SensorError::Malformed(format!("bad t= value '{}': {}", millis.trim(), e)))?;

    let celsius = millis as f64 / 1000.0;
    if !(MIN_READING..=MAX_READING).contains(&celsius) {
        return Err(SensorError::OutOfRange(celsius));
    }
    Ok(celsius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    #[test]
    fn test_parse_good_reading() {
        assert_eq!(parse_w1_slave(GOOD).unwrap(), 23.125);
    }

    #[test]
    fn test_parse_negative_reading() {
        let raw = "ff ff : crc=aa YES\nff ff t=-10250\n";
        assert_eq!(parse_w1_slave(raw).unwrap(), -10.25);
    }

    #[test]
    fn test_parse_crc_failure() {
        let raw = "72 01 4b 46 : crc=57 NO\n72 01 4b 46 t=23125\n";
        assert!(matches!(parse_w1_slave(raw), Err(SensorError::CrcMismatch)));
    }

    #[test]
    fn test_parse_missing_value() {
        assert!(matches!(parse_w1_slave("aa : crc=57 YES\n"), Err(SensorError::Malformed(_))));
        assert!(matches!(parse_w1_slave("aa : crc=57 YES\naa t=abc\n"), Err(SensorError::Malformed(_))));
        assert!(matches!(parse_w1_slave(""), Err(SensorError::Malformed(_))));
    }

    #[test]
    fn test_parse_out_of_range() {
        let raw = "aa : crc=57 YES\naa t=127000\n";
        assert!(matches!(parse_w1_slave(raw), Err(SensorError::OutOfRange(_))));
    }

    #[tokio::test]
    async fn test_read_from_device_file() {
        let dir = tempdir().unwrap();
        let device_dir = dir.path().join("28-0000075a1b2c");
        std::fs::create_dir_all(&device_dir).unwrap();
        std::fs::write(device_dir.join("w1_slave"), GOOD).unwrap();

        let sensor = Ds18b20Sensor::new(dir.path(), "28-0000075a1b2c");
        assert_eq!(sensor.read().await.unwrap(), 23.125);
    }

    #[tokio::test]
    async fn test_missing_device_is_io_error() {
        let dir = tempdir().unwrap();
        let sensor = Ds18b20Sensor::new(dir.path(), "28-missing");
        assert!(matches!(sensor.read().await, Err(SensorError::Io(_))));
    }
}
