//! gpsd client
//!
//! Protocol (JSON over TCP, default port 2947):
//! - Server greets with a `VERSION` object on connect
//! - Client sends `?WATCH={"enable":true,"json":true};`
//! - Server streams `DEVICES`, `WATCH`, `SKY`, `TPV`... one object per line
//! - `TPV` with `mode >= 2` carries a 2D/3D fix in `lat`/`lon`
//!
//! Each query opens a fresh connection and returns the first usable fix.

use crate::domain::types::{Coordinate, PositionOptions, PositionSample};
use crate::io::provider::{LocationProvider, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Minimum TPV mode that carries a position (2 = 2D fix)
const MODE_2D: u8 = 2;

#[derive(Debug, Deserialize)]
#[serde(tag = "class")]
enum Report {
    #[serde(rename = "TPV")]
    Tpv(Tpv),
    #[serde(rename = "ERROR")]
    Error { message: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Tpv {
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    time: Option<DateTime<Utc>>,
    /// Estimated horizontal position error (m)
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
}

/// Outcome of a single line read from gpsd
#[derive(Debug, PartialEq)]
enum LineOutcome {
    Fix(PositionSample),
    Failed(String),
    Skip,
}

fn parse_line(line: &str, options: &PositionOptions, now: DateTime<Utc>) -> LineOutcome {
    let report: Report = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            trace!(error = %e, "gpsd_unparsed_line");
            return LineOutcome::Skip;
        }
    };

    let tpv = match report {
        Report::Tpv(tpv) => tpv,
        Report::Error { message } => return LineOutcome::Failed(message),
        Report::Other => return LineOutcome::Skip,
    };

    let (Some(lat), Some(lon)) = (tpv.lat, tpv.lon) else {
        return LineOutcome::Skip;
    };
    if tpv.mode < MODE_2D {
        return LineOutcome::Skip;
    }
    let coordinate = Coordinate::new(lat, lon);
    if !coordinate.is_valid() {
        debug!(coordinate = %coordinate, "gpsd_fix_out_of_range");
        return LineOutcome::Skip;
    }

    let timestamp = tpv.time.unwrap_or(now);
    if !options.maximum_age.is_zero() {
        let age = (now - timestamp).to_std().unwrap_or_default();
        if age > options.maximum_age {
            debug!(age_ms = age.as_millis() as u64, "gpsd_fix_too_old");
            return LineOutcome::Skip;
        }
    }

    let accuracy = tpv.eph.or_else(|| match (tpv.epx, tpv.epy) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    });

    let sample = PositionSample::new(coordinate, timestamp);
    LineOutcome::Fix(match accuracy {
        Some(acc) => sample.with_accuracy(acc),
        None => sample,
    })
}

pub struct GpsdProvider {
    addr: String,
}

impl GpsdProvider {
    pub fn new(addr: &str) -> Self {
        Self { addr: addr.to_string() }
    }
}

#[async_trait]
impl LocationProvider for GpsdProvider {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<PositionSample, ProviderError> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(WATCH_COMMAND).await?;

        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_line(&line, options, Utc::now()) {
                LineOutcome::Fix(sample) => {
                    debug!(addr = %self.addr, coordinate = %sample.coordinate, "gpsd_fix");
                    return Ok(sample);
                }
                LineOutcome::Failed(message) => return Err(ProviderError::new(message)),
                LineOutcome::Skip => {}
            }
        }

        Err(ProviderError::new("gpsd closed the connection before reporting a fix"))
    }
}
