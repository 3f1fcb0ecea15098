//! Off-thread shot evaluation
//!
//! Workers share nothing with the caller: every job carries its own copy of
//! the state, shot and params, and the finished state comes back by value.
//! Jobs are matched to replies by a `JobId` correlation id.

use std::collections::{BTreeSet, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::params::Params;
use crate::sim::{Shot, SimResult, SimulationState, strike};

/// Correlation id of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

struct Job {
    id: JobId,
    state: SimulationState,
    shot: Shot,
    params: Params,
}

/// A finished evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub id: JobId,
    pub shot: Shot,
    pub result: SimResult,
    /// Table after the run
    pub state: SimulationState,
}

enum Reply {
    Done(Box<JobOutput>),
    Failed(JobId),
}

fn worker_loop(jobs: Receiver<Job>, replies: Sender<Reply>) {
    for job in jobs.iter() {
        let Job {
            id,
            mut state,
            shot,
            params,
        } = job;
        let outcome = catch_unwind(AssertUnwindSafe(|| strike(&mut state, &shot, &params)));
        let reply = match outcome {
            Ok(result) => Reply::Done(Box::new(JobOutput {
                id,
                shot,
                result,
                state,
            })),
            Err(_) => {
                log::error!("Job {} panicked, result dropped", id.0);
                Reply::Failed(id)
            }
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Fixed-size pool of simulation workers
pub struct ShotPool {
    jobs: Option<Sender<Job>>,
    replies: Receiver<Reply>,
    workers: Vec<JoinHandle<()>>,
    next_id: u64,
    /// Submitted, reply not yet handed out
    outstanding: BTreeSet<JobId>,
    /// Replies that arrived before anyone waited for them
    buffered: HashMap<JobId, Option<JobOutput>>,
}

impl ShotPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (job_tx, job_rx) = channel::unbounded();
        let (reply_tx, reply_rx) = channel::unbounded();
        let handles = (0..workers)
            .map(|_| {
                let jobs = job_rx.clone();
                let replies = reply_tx.clone();
                thread::spawn(move || worker_loop(jobs, replies))
            })
            .collect();
        log::debug!("Started shot pool with {workers} workers");

        Self {
            jobs: Some(job_tx),
            replies: reply_rx,
            workers: handles,
            next_id: 0,
            outstanding: BTreeSet::new(),
            buffered: HashMap::new(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue one shot against a copy of `state`
    pub fn submit(&mut self, state: &SimulationState, shot: Shot, params: &Params) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.outstanding.insert(id);

        let job = Job {
            id,
            state: state.clone(),
            shot,
            params: params.clone(),
        };
        let sent = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            log::warn!("Shot pool has no live workers, job {} dropped", id.0);
            self.buffered.insert(id, None);
        }
        id
    }

    fn stash(&mut self, reply: Reply) {
        match reply {
            Reply::Done(output) => {
                self.buffered.insert(output.id, Some(*output));
            }
            Reply::Failed(id) => {
                self.buffered.insert(id, None);
            }
        }
    }

    fn take(&mut self, id: JobId) -> Option<Option<JobOutput>> {
        let output = self.buffered.remove(&id)?;
        self.outstanding.remove(&id);
        Some(output)
    }

    /// Block until job `id` finishes
    ///
    /// Returns `None` for unknown or already collected ids, for a job whose
    /// run panicked, and once every worker is gone.
    pub fn wait(&mut self, id: JobId) -> Option<JobOutput> {
        if !self.outstanding.contains(&id) {
            return None;
        }
        loop {
            if let Some(output) = self.take(id) {
                return output;
            }
            match self.replies.recv() {
                Ok(reply) => self.stash(reply),
                Err(_) => {
                    self.outstanding.remove(&id);
                    return None;
                }
            }
        }
    }

    /// Non-blocking check whether job `id` has a reply waiting
    pub fn is_ready(&mut self, id: JobId) -> bool {
        while let Ok(reply) = self.replies.try_recv() {
            self.stash(reply);
        }
        self.buffered.contains_key(&id)
    }

    /// Evaluate many shots from one starting table
    ///
    /// Outputs come back in submission order; failed jobs are left out.
    pub fn evaluate_batch(
        &mut self,
        state: &SimulationState,
        shots: &[Shot],
        params: &Params,
    ) -> Vec<JobOutput> {
        let ids: Vec<JobId> = shots
            .iter()
            .map(|shot| self.submit(state, *shot, params))
            .collect();
        ids.into_iter().filter_map(|id| self.wait(id)).collect()
    }
}

impl Drop for ShotPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker loop
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Shot worker exited abnormally");
            }
        }
    }
}

/// One shot run off the caller's thread
pub struct BackgroundRun {
    pool: ShotPool,
    id: JobId,
}

impl BackgroundRun {
    pub fn start(state: &SimulationState, shot: Shot, params: &Params) -> Self {
        let mut pool = ShotPool::new(1);
        let id = pool.submit(state, shot, params);
        Self { pool, id }
    }

    /// True once the run has finished
    pub fn is_finished(&mut self) -> bool {
        self.pool.is_ready(self.id)
    }

    /// Block for the outcome
    pub fn join(mut self) -> Option<JobOutput> {
        self.pool.wait(self.id)
    }
}
