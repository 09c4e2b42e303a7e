use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tqdm::Iter;

pub trait Worker<T>
where
    T: Send,
    Self: Sync,
{
    type Out: Send;

    fn proc(&self, input: T) -> Self::Out;

    fn para<I>(&self, in_v: I, n_threads: usize, desc: &str) -> Result<Vec<Self::Out>, usize>
    where
        I: ExactSizeIterator<Item = T> + Send,
    {
        para_run(self, in_v, n_threads, desc)
    }
}

/// Runs every input through `worker` on `n_threads` scoped threads.
///
/// Outputs come back in completion order. If any worker panics, the number of crashed
/// workers is returned instead of the partial results.
pub fn para_run<W, T, I>(
    worker: &W,
    in_v: I,
    n_threads: usize,
    desc: &str,
) -> Result<Vec<W::Out>, usize>
where
    W: Worker<T> + ?Sized,
    I: ExactSizeIterator<Item = T> + Send,
    T: Send,
{
    let n_threads = n_threads.max(1);
    let n_inputs = in_v.len();
    let (sender, r) = bounded(n_threads * 100);
    let (out_sender, out_r) = unbounded();

    thread::scope(|s| {
        let handles: Vec<_> = (0..n_threads)
            .map(|_| {
                let in_clone = r.clone();
                let out_clone = out_sender.clone();
                s.spawn(move || subf(worker, in_clone, out_clone))
            })
            .collect();
        drop(out_sender);

        let feeder = s.spawn(move || {
            for e in in_v {
                if sender.send(Some(e)).is_err() {
                    return;
                }
            }
            for _ in 0..n_threads {
                if sender.send(None).is_err() {
                    return;
                }
            }
        });

        let mut outs = Vec::with_capacity(n_inputs);
        for _ in (0..n_inputs).tqdm().desc(Some(desc)) {
            match out_r.recv() {
                Ok(out) => outs.push(out),
                // every worker is gone
                Err(_) => break,
            }
        }
        drop(r);

        let crashed = handles
            .into_iter()
            .map(|h| h.join())
            .filter(|res| res.is_err())
            .count();
        // the feeder can only stop early once workers died
        let _ = feeder.join();

        if crashed > 0 {
            Err(crashed)
        } else {
            Ok(outs)
        }
    })
}

fn subf<W, T>(worker: &W, r: Receiver<Option<T>>, out: Sender<W::Out>)
where
    W: Worker<T> + ?Sized,
    T: Send,
{
    while let Ok(Some(input)) = r.recv() {
        if out.send(worker.proc(input)).is_err() {
            break;
        }
    }
}
