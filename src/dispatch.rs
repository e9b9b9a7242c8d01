//! Dispatch orchestration: resolves each requester group to an address,
//! renders its digest, and drives the mail transport according to the
//! selected mode. Per-message failures never abort the batch.

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::error::{DigestError, Result};
use crate::model::{
    DispatchMode, DispatchResult, OutgoingMessage, RecipientOutcome, RequesterGroup, Sheet,
};
use crate::resolve::EmailResolver;
use crate::settings::Settings;
use crate::template::{self, RenderedDigest};
use crate::transport::MailTransport;

struct PreparedDigest {
    key: String,
    resolved: Option<String>,
    digest: RenderedDigest,
    item_count: usize,
}

/// Runs one dispatch batch over the given groups.
///
/// * `preview` resolves and reports; the transport is never invoked.
/// * `demo` sends copies of the first few digests to the operator-supplied
///   test addresses, each tagged with its intended recipient.
/// * `live` drops unresolved groups, then sends to the resolved addresses.
///
/// Demo and live batches export the unmapped-identity report afterwards.
#[instrument(skip_all, fields(mode = mode.tag(), groups = groups.len()))]
pub fn dispatch(
    sheet: &Sheet,
    groups: &[RequesterGroup],
    mode: DispatchMode,
    test_recipients: &[String],
    resolver: &mut EmailResolver,
    transport: &mut dyn MailTransport,
    settings: &Settings,
) -> Result<DispatchResult> {
    if mode == DispatchMode::Demo && test_recipients.is_empty() {
        return Err(DigestError::MissingTestRecipients);
    }

    resolver.reset_stats();
    let generated_at = Local::now();

    let prepared: Vec<PreparedDigest> = groups
        .iter()
        .map(|group| {
            let resolved = resolver.resolve(&group.key);
            let digest = template::render_digest(
                &group.key,
                sheet,
                &group.rows,
                &settings.target_statuses,
                &settings.sender_name,
                generated_at,
            );
            PreparedDigest {
                key: group.key.clone(),
                resolved,
                digest,
                item_count: group.rows.len(),
            }
        })
        .collect();

    let resolved_count = prepared.iter().filter(|p| p.resolved.is_some()).count();
    info!(
        resolved = resolved_count,
        unresolved = prepared.len() - resolved_count,
        "recipient resolution finished"
    );

    let mut result = DispatchResult::default();

    match mode {
        DispatchMode::Preview => {
            for prepared in &prepared {
                result.per_recipient.push(RecipientOutcome {
                    group_key: prepared.key.clone(),
                    resolved_address: prepared.resolved.clone(),
                    sent: false,
                });
            }
        }
        DispatchMode::Demo => {
            for (idx, prepared) in prepared.iter().enumerate() {
                let mut any_sent = false;
                if idx < settings.demo_group_limit {
                    for test_address in test_recipients {
                        let message = demo_message(prepared, test_address);
                        if transport.send(&message) {
                            result.successful += 1;
                            any_sent = true;
                        } else {
                            result.failed += 1;
                        }
                    }
                }
                result.per_recipient.push(RecipientOutcome {
                    group_key: prepared.key.clone(),
                    resolved_address: prepared.resolved.clone(),
                    sent: any_sent,
                });
            }
            export_unmapped(resolver, settings, mode)?;
        }
        DispatchMode::Live => {
            if resolved_count == 0 {
                return Err(DigestError::NoResolvedRecipients);
            }
            for prepared in &prepared {
                let sent = match &prepared.resolved {
                    // Unresolved groups never reach the transport; a wrong
                    // or empty address must not receive someone's digest.
                    None => false,
                    Some(address) => {
                        let message = OutgoingMessage::new(
                            address.clone(),
                            prepared.digest.subject.clone(),
                            prepared.digest.html_body.clone(),
                        );
                        if transport.send(&message) {
                            result.successful += 1;
                            true
                        } else {
                            result.failed += 1;
                            warn!(recipient = %prepared.key, "transport reported failure, continuing");
                            false
                        }
                    }
                };
                result.per_recipient.push(RecipientOutcome {
                    group_key: prepared.key.clone(),
                    resolved_address: prepared.resolved.clone(),
                    sent,
                });
            }
            export_unmapped(resolver, settings, mode)?;
        }
    }

    info!(
        successful = result.successful,
        failed = result.failed,
        stats = ?resolver.stats(),
        "dispatch batch finished"
    );
    Ok(result)
}

fn demo_message(prepared: &PreparedDigest, test_address: &str) -> OutgoingMessage {
    let resolved = prepared
        .resolved
        .as_deref()
        .unwrap_or("address not found");
    let subject = format!(
        "[DEMO] ERF Status for {} - {} Items",
        prepared.key, prepared.item_count
    );
    let html_body = format!(
        "<p><strong>DEMO MESSAGE</strong></p>\
         <p>Original recipient: {}<br>Resolved address: {}<br>Items: {}</p>\
         <hr>\n{}",
        prepared.key, resolved, prepared.item_count, prepared.digest.html_body
    );
    OutgoingMessage::new(test_address, subject, html_body)
}

fn export_unmapped(
    resolver: &EmailResolver,
    settings: &Settings,
    mode: DispatchMode,
) -> Result<()> {
    if let Some(path) = resolver.export_unmapped(&settings.export_dir, mode.tag())? {
        info!(path = %path.display(), "unmapped identifiers exported");
    }
    Ok(())
}
