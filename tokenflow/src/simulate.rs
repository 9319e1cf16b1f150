//! Producer/consumer simulation over one backpressure stream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use config::StreamingConfig;
use futures::StreamExt;
use llm::{BackpressureStream, Cancellation, Context, PacedWriter, StreamError, StreamMultiplexer, StreamStats, Token};
use tokio::task::JoinSet;

use crate::args::Args;

#[derive(Debug, Clone)]
pub(crate) struct Simulation {
    pub producers: usize,
    pub tokens_per_producer: u64,
    pub consumers: usize,
    pub consumer_delay: Duration,
    pub write_timeout: Option<Duration>,
}

impl From<&Args> for Simulation {
    fn from(args: &Args) -> Self {
        Self {
            producers: args.producers,
            tokens_per_producer: args.tokens_per_producer,
            consumers: args.consumers.max(1),
            consumer_delay: args.consumer_delay,
            write_timeout: args.write_timeout,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ProducerOutcome {
    rejected: u64,
    timed_out: u64,
}

#[derive(Debug)]
pub(crate) struct ConsumerReport {
    pub received: u64,
    pub stats: StreamStats,
}

#[derive(Debug)]
pub(crate) struct Report {
    pub source: StreamStats,
    pub consumers: Vec<ConsumerReport>,
    pub rejected: u64,
    pub timed_out: u64,
    pub elapsed: Duration,
}

impl Report {
    pub fn log(&self) {
        let source = &self.source;

        log::info!(
            "Source stream: written={} dropped={} read={} blocked={} rejected={} timed_out={} in {:?}",
            source.written,
            source.dropped,
            source.read,
            source.blocked,
            self.rejected,
            self.timed_out,
            self.elapsed
        );

        for (id, consumer) in self.consumers.iter().enumerate() {
            log::info!(
                "Consumer {id}: received={} dropped={} blocked={}",
                consumer.received,
                consumer.stats.dropped,
                consumer.stats.blocked
            );
        }
    }
}

enum Sink {
    Direct(Arc<BackpressureStream>),
    Paced(PacedWriter),
}

impl Sink {
    async fn write(&self, ctx: &Context, token: Token) -> llm::Result<()> {
        match self {
            Sink::Direct(stream) => stream.write(ctx, token).await,
            Sink::Paced(writer) => writer.write(ctx, token).await,
        }
    }
}

/// Runs producers into one stream and drains it with one or more consumers.
pub(crate) async fn run(simulation: &Simulation, config: &StreamingConfig, ctx: &Context) -> anyhow::Result<Report> {
    let started = Instant::now();
    let source = Arc::new(BackpressureStream::new(config.backpressure.clone())?);

    let sink = match &config.pacing {
        Some(pacing) => {
            log::info!(
                "Pacing producers at {} tokens/s with a burst of {}",
                pacing.tokens_per_second,
                pacing.burst
            );
            Sink::Paced(PacedWriter::new(Arc::clone(&source), pacing)?)
        }
        None => Sink::Direct(Arc::clone(&source)),
    };
    let sink = Arc::new(sink);

    let mut consumers = JoinSet::new();
    let multiplexer = if simulation.consumers > 1 {
        let multiplexer = Arc::new(StreamMultiplexer::new(Arc::clone(&source), &config.fanout));

        for _ in 0..simulation.consumers {
            let stream = multiplexer.add_consumer(config.backpressure.clone())?;
            consumers.spawn(consume(stream, simulation.consumer_delay, ctx.clone()));
        }

        multiplexer.start(ctx.clone())
    } else {
        consumers.spawn(consume(Arc::clone(&source), simulation.consumer_delay, ctx.clone()));
        None
    };

    let mut producers = JoinSet::new();
    for producer in 0..simulation.producers as u64 {
        producers.spawn(produce(
            Arc::clone(&sink),
            producer,
            simulation.tokens_per_producer,
            simulation.write_timeout,
            ctx.clone(),
        ));
    }

    let mut outcome = ProducerOutcome::default();
    while let Some(result) = producers.join_next().await {
        let producer = result?;
        outcome.rejected += producer.rejected;
        outcome.timed_out += producer.timed_out;
    }

    source.close();

    let mut reports = Vec::with_capacity(simulation.consumers);
    while let Some(result) = consumers.join_next().await {
        reports.push(result?);
    }

    if let Some(multiplexer) = multiplexer {
        multiplexer.await?;
    }

    Ok(Report {
        source: source.stats(),
        consumers: reports,
        rejected: outcome.rejected,
        timed_out: outcome.timed_out,
        elapsed: started.elapsed(),
    })
}

async fn produce(
    sink: Arc<Sink>,
    producer: u64,
    tokens: u64,
    write_timeout: Option<Duration>,
    ctx: Context,
) -> ProducerOutcome {
    let mut outcome = ProducerOutcome::default();

    for n in 0..tokens {
        let token = Token::new(producer * tokens + n, format!("p{producer}-t{n}"));

        let write_ctx = match write_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        match sink.write(&write_ctx, token).await {
            Ok(()) => {}
            Err(StreamError::BufferFull) => outcome.rejected += 1,
            Err(StreamError::Cancelled(Cancellation::DeadlineExceeded)) if ctx.cause().is_none() => {
                outcome.timed_out += 1;
            }
            Err(e) => {
                log::debug!("Producer {producer} stopped after {n} tokens: {e}");
                break;
            }
        }
    }

    outcome
}

async fn consume(stream: Arc<BackpressureStream>, delay: Duration, ctx: Context) -> ConsumerReport {
    let mut received = 0;
    let mut tokens = std::pin::pin!(stream.tokens(ctx));

    while let Some(token) = tokens.next().await {
        match token {
            Ok(token) if token.is_error() => {
                log::warn!("Stream ended with an upstream error at token {}", token.index());
                received += 1;
            }
            Ok(_) => received += 1,
            Err(e) => {
                log::debug!("Consumer stopped: {e}");
                break;
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    ConsumerReport {
        received,
        stats: stream.stats(),
    }
}
