//! Reads the zone file currently deployed on a target host.
use tracing::{debug, warn};

use crate::error::ConvergeError;
use crate::transport::Transport;
use crate::zone::{CanonicalState, parse, to_state};

/// Canonical state of the zone file at `path` on `host`.
///
/// `Ok(None)` means nothing usable is deployed: the file is missing, empty,
/// not UTF-8, or does not parse as a zone with SOA and NS records. Transport
/// errors are returned as they are.
pub async fn read_state(
    transport: &dyn Transport,
    host: &str,
    path: &str,
    zone_name: &str,
) -> Result<Option<CanonicalState>, ConvergeError> {
    if !transport
        .exists(host, path)
        .await
        .map_err(ConvergeError::transport)?
    {
        debug!(host, path, "no zone file deployed");
        return Ok(None);
    }

    let Some(bytes) = transport
        .fetch(host, path)
        .await
        .map_err(ConvergeError::transport)?
    else {
        return Ok(None);
    };

    let Ok(text) = String::from_utf8(bytes) else {
        warn!(host, path, "deployed zone file is not UTF-8, treating as absent");
        return Ok(None);
    };

    match parse(&text, zone_name) {
        Ok(zone) => Ok(Some(to_state(&zone))),
        Err(err) => {
            warn!(host, path, error = %err, "deployed zone file unusable, treating as absent");
            Ok(None)
        }
    }
}
