//! Demo application running a handful of producer threads all funneling work through one shared
//! gate. A monitor thread tracks a mock queue depth, engages back-pressure past a high watermark
//! and removes it once the queue drains below half of it. Hit ^C to stop: the handler removes
//! back-pressure so that any parked producer is released before the threads join.
extern crate back_pressure;
#[macro_use]
extern crate clap;
extern crate ctrlc;
extern crate rand;
#[macro_use]
extern crate slog;
extern crate slog_async;
extern crate slog_term;

use back_pressure::executor::*;
use rand::{thread_rng, Rng};
use slog::{Drain, Level, LevelFilter, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainSyncDecorator};
use std::cmp;
use std::io::stderr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {

    //
    // - init slog to dump on stderr
    //
    let decorator = PlainSyncDecorator::new(stderr());
    let formatted = FullFormat::new(decorator).build().fuse();
    let queued = Async::new(formatted).build().fuse();
    let filter = LevelFilter::new(queued, Level::Trace).fuse();
    let root = Logger::root(filter, o!());
    let log = root.new(o!("sys" => "main"));
    debug!(&log, "starting (version={})", env!("CARGO_PKG_VERSION"));

    //
    // - parse the CLI line
    //
    let args = clap_app!(pipeline =>
        (version: env!("CARGO_PKG_VERSION"))
        (@arg SIZE: -s --size +takes_value "number of producer threads")
        (@arg DEPTH: -d --depth +takes_value "queue depth high watermark")
    ).get_matches();
    let size = cmp::min(value_t!(args, "SIZE", usize).unwrap_or(8), 64);
    let watermark = value_t!(args, "DEPTH", usize).unwrap_or(64);

    //
    // - one shared gate plus the mock queue depth the monitor watches
    //
    let gate = Arc::new(GatedExecutor::with_logger(root.new(o!("sys" => "gate"))));
    let depth = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    //
    // - start the producers
    // - each one enqueues via the gate with a 250ms blocking limit and tracks
    //   how many records got through vs. timed out
    //
    let mut threads = Vec::new();
    for n in 0..size {
        let gate = gate.clone();
        let depth = depth.clone();
        let done = done.clone();
        let log = root.new(o!("sys" => "producer", "id" => n));
        let tid = thread::spawn(move || {
            let mut rng = thread_rng();
            let mut sent = 0u64;
            let mut expired = 0u64;
            while !done.load(Ordering::Relaxed) {
                let ok = gate.execute(Some(Duration::from_millis(250)), || {
                    depth.fetch_add(1, Ordering::Relaxed);
                });
                if ok {
                    sent += 1;
                } else {
                    expired += 1;
                }
                thread::sleep(Duration::from_millis(rng.gen_range(1, 10)));
            }
            info!(&log, "done ({} sent, {} expired)", sent, expired);
        });
        threads.push(tid);
    }

    //
    // - start the monitor
    // - it drains a random chunk of the queue on a 25ms cadence and flips
    //   back-pressure based on the watermark (with a bit of hysteresis)
    //
    {
        let gate = gate.clone();
        let depth = depth.clone();
        let done = done.clone();
        let log = root.new(o!("sys" => "monitor"));
        let tid = thread::spawn(move || {
            let mut rng = thread_rng();
            while !done.load(Ordering::Relaxed) {
                let cur = depth.load(Ordering::Relaxed);
                let drained = cmp::min(cur, rng.gen_range(1, 16));
                depth.fetch_sub(drained, Ordering::Relaxed);
                if cur > watermark {
                    if !gate.is_engaged() {
                        info!(&log, "high watermark hit ({} queued)", cur);
                    }
                    gate.engage_back_pressure();
                } else if gate.is_engaged() && cur <= watermark / 2 {
                    info!(&log, "queue drained ({} queued)", cur);
                    gate.remove_back_pressure();
                }
                thread::sleep(Duration::from_millis(25));
            }
        });
        threads.push(tid);
    }

    //
    // - trap SIGINT/SIGTERM
    // - make sure to remove back-pressure so that parked producers get
    //   released and notice the done flag
    //
    {
        let gate = gate.clone();
        let done = done.clone();
        ctrlc::set_handler(move || {
            done.store(true, Ordering::Release);
            gate.remove_back_pressure();
        }).unwrap();
    }

    //
    // - block until all our threads gracefully exit
    //
    for tid in threads {
        let _ = tid.join();
    }
    info!(&log, "exiting");
}
