//! Streaming API: feed a stream of items, receive a stream of outcomes.
//!
//! ## Modes
//!
//! * `concurrency = None`: one item at a time. The next item is not admitted
//!   until the previous outcome has been delivered, so outputs arrive in input
//!   order.
//! * `concurrency = Some(n)`: up to `n` rasterizer calls in flight. Items are
//!   admitted in arrival order but outcomes are emitted as conversions finish;
//!   sort downstream if order matters.
//!
//! ## Failure
//!
//! The first `Err` is the last element of the output stream: the stream ends
//! right after it, whatever the input or the other conversions are doing. The
//! driver stops admitting as soon as the failure is recorded, even while it is
//! waiting on an idle input. Conversions already in flight are not cancelled:
//! they run to completion and their outcomes are dropped.
//!
//! Dropping the output stream stops the driver the same way.

use crate::convert::Svg2Png;
use crate::error::{FailureKind, StageError};
use crate::item::PipelineItem;
use crate::pipeline::admission::AdmissionGate;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// One outcome per admitted item.
pub type Outcome = Result<PipelineItem, StageError>;

/// A boxed stream of outcomes.
pub type ItemStream = Pin<Box<dyn Stream<Item = Outcome> + Send>>;

impl Svg2Png {
    /// Run the stage over a stream of items.
    ///
    /// Must be called from within a tokio runtime: the driver and each
    /// conversion run on their own tasks. Dropping the returned stream stops
    /// further admissions.
    pub fn process<S>(&self, input: S) -> ItemStream
    where
        S: Stream<Item = PipelineItem> + Send + 'static,
    {
        let limit = self.config().concurrency.unwrap_or(1);
        let gate = AdmissionGate::new(limit);
        let (tx, rx) = mpsc::channel(limit);

        tokio::spawn(drive(self.clone(), Box::pin(input), gate, tx));

        // Dropping the receiver after the first error closes the channel,
        // which is what stops the driver.
        let outcomes = stream::unfold(Some(ReceiverStream::new(rx)), |rx| async move {
            let mut rx = rx?;
            let outcome = rx.next().await?;
            let rest = if outcome.is_ok() { Some(rx) } else { None };
            Some((outcome, rest))
        });
        Box::pin(outcomes)
    }

    /// Run the stage over a finite batch and collect the results.
    ///
    /// Returns the first fatal error, if any.
    pub async fn process_all<I>(&self, items: I) -> Result<Vec<PipelineItem>, StageError>
    where
        I: IntoIterator<Item = PipelineItem>,
        I::IntoIter: Send + 'static,
    {
        self.process(stream::iter(items)).try_collect().await
    }
}

/// Admit items in arrival order and spawn one task per conversion.
async fn drive(
    stage: Svg2Png,
    mut input: Pin<Box<dyn Stream<Item = PipelineItem> + Send>>,
    gate: AdmissionGate,
    tx: mpsc::Sender<Outcome>,
) {
    let (halt_tx, mut halt_rx) = watch::channel(false);
    let halt_tx = Arc::new(halt_tx);
    let mut admitted = 0usize;

    loop {
        let item = tokio::select! {
            biased;
            _ = tx.closed() => break,
            _ = halt_rx.changed() => break,
            next = input.next() => match next {
                Some(item) => item,
                None => break,
            },
        };

        // A failure closes the gate, which fails a pending admit.
        let permit = tokio::select! {
            biased;
            _ = tx.closed() => break,
            permit = gate.admit() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        if *halt_rx.borrow() {
            break;
        }
        admitted += 1;

        let stage = stage.clone();
        let gate = gate.clone();
        let tx = tx.clone();
        let halt_tx = Arc::clone(&halt_tx);

        tokio::spawn(async move {
            let path = item.path.clone();
            let name = stage.name().to_string();

            let outcome = match tokio::spawn(async move { stage.execute(item).await }).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{}: conversion task for {} died: {}", name, path.display(), e);
                    Err(StageError::new(
                        name,
                        path,
                        FailureKind::Internal(format!("conversion task failed: {e}")),
                    ))
                }
            };

            // Recorded before the permit is released, so no later item can
            // be admitted behind a failure.
            if outcome.is_err() {
                halt_tx.send_replace(true);
                gate.close();
            }
            // The receiver is gone once the host has stopped listening.
            let _ = tx.send(outcome).await;
            drop(permit);
        });
    }

    debug!(
        "{}: admitted {} items, {} still in flight",
        stage.name(),
        admitted,
        gate.in_flight()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageConfig;
    use crate::error::RasterizeError;
    use crate::pipeline::rasterize::from_fn;
    use std::path::PathBuf;

    fn echo_stage(concurrency: Option<usize>) -> Svg2Png {
        let mut builder = StageConfig::builder().verbose(false);
        if let Some(n) = concurrency {
            builder = builder.concurrency(n);
        }
        Svg2Png::with_rasterizer(
            builder.build().unwrap(),
            from_fn(|svg, _opts| async move { Ok::<_, RasterizeError>(svg) }),
        )
    }

    fn svg(name: &str) -> PipelineItem {
        PipelineItem::from_bytes(name, "<svg/>")
    }

    #[tokio::test]
    async fn sequential_preserves_order() {
        let stage = echo_stage(None);
        let out = stage
            .process_all(vec![svg("a.svg"), svg("b.svg"), svg("c.svg")])
            .await
            .unwrap();
        let paths: Vec<PathBuf> = out.into_iter().map(|i| i.path).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.png"),
                PathBuf::from("c.png")
            ]
        );
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let stage = echo_stage(Some(4));
        let out = stage.process_all(Vec::new()).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn stream_ends_after_first_error() {
        let stage = echo_stage(None);
        let items = vec![
            svg("a.svg"),
            PipelineItem::from_bytes("bad.svg", "not svg"),
            svg("c.svg"),
        ];
        let outcomes: Vec<Outcome> = stage.process(stream::iter(items)).collect().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        let err = outcomes[1].as_ref().unwrap_err();
        assert_eq!(err.path, PathBuf::from("bad.svg"));
    }

    #[tokio::test]
    async fn panicking_rasterizer_becomes_internal_error() {
        let stage = Svg2Png::with_rasterizer(
            StageConfig::builder().verbose(false).build().unwrap(),
            from_fn(|_svg, _opts| async move {
                if true {
                    panic!("codec crashed");
                }
                Ok::<_, RasterizeError>(vec![])
            }),
        );
        let err = stage.process_all(vec![svg("a.svg")]).await.unwrap_err();
        assert!(matches!(err.kind, FailureKind::Internal(_)), "got: {err:?}");
    }
}
