//! `geoloc watch`: stream locations until interrupted.

use std::path::PathBuf;

use futures::StreamExt;
use geoloc::config::ConfigFile;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{print_sample, runtime, LocationArgs, Session};
use crate::error::CliError;

pub fn run(
    args: &LocationArgs,
    watch_id: &str,
    count: Option<usize>,
    scenario: Option<&PathBuf>,
    config: &ConfigFile,
) -> Result<(), CliError> {
    let options = args.resolve(config);
    let session = Session::open(scenario)?;

    runtime()?.block_on(async move {
        let cancellation = CancellationToken::new();

        let ctrl_c = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping watch");
                ctrl_c.cancel();
            }
        });

        let motion = session
            .scenario
            .drive(session.device.clone(), cancellation.child_token());

        let mut stream = session.controller.add_watch(options, watch_id);
        info!(watch_id = stream.watch_id(), "Watching position");
        let mut batches = 0usize;
        let mut outcome = Ok(());

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                item = stream.next() => match item {
                    Some(Ok(batch)) => {
                        batch.iter().for_each(print_sample);
                        batches += 1;
                        if count.is_some_and(|limit| batches >= limit) {
                            session.controller.clear_watch(watch_id);
                        }
                    }
                    Some(Err(error)) => {
                        warn!(watch_id, %error, "Watch failed");
                        outcome = Err(CliError::Location(error));
                    }
                    None => break,
                }
            }
        }

        drop(stream);
        cancellation.cancel();
        let _ = motion.await;
        info!(watch_id, batches, "Watch finished");
        outcome
    })
}
