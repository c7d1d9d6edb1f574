//! Key taps on the virtual keyboard

use asus_smc_platform::{InputReportSink, KeyReport};
use tracing::{debug, warn};

/// Post `count` press/release pairs for one usage
///
/// Stops at the first failed post. Returns the number of complete taps.
pub async fn tap(sink: &dyn InputReportSink, page: u16, usage: u16, count: usize) -> usize {
    debug!("Tap 0x{:02X}:0x{:02X} x{}", page, usage, count);
    for done in 0..count {
        let result = match sink.post(KeyReport::press(page, usage)).await {
            Ok(()) => sink.post(KeyReport::release(page, usage)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Failed to post key 0x{:02X}:0x{:02X}: {}", page, usage, e);
            return done;
        }
    }
    count
}
