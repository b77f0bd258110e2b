//! Chat reply formatting.

use torrelay_abstraction::TransferStatus;

/// Formats the one-shot status summary sent after a successful submission.
///
/// Progress is rendered as a percentage and the rates are converted from
/// bytes/sec to KB/s, all to two decimals.
#[must_use]
pub fn summary(status: &TransferStatus) -> String {
    let percent = status.percent_done * 100.0;
    let down_kb = status.rate_download as f64 / 1024.0;
    let up_kb = status.rate_upload as f64 / 1024.0;

    format!(
        "Torrent added successfully.\n\
         Name: {}\n\
         Status: {}\n\
         Progress: {:.2}%\n\
         Download Rate: {:.2} KB/s\n\
         Upload Rate: {:.2} KB/s",
        status.name,
        status.state.label(),
        percent,
        down_kb,
        up_kb
    )
}
