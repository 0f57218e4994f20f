//! Argument parsing. This is the only place the CLI surface named in §6 of
//! the spec is defined; everything downstream takes a [`Variant`]/
//! [`MutexAlgo`] and a built [`peerlab_core::PeerConfig`], never `Args`
//! itself.

use clap::{Parser, ValueEnum};

use peerlab_core::MutexVariant;

/// Which of the three layered protocols runs between the start and done
/// barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Barrier only: children announce STARTED/DONE and do no other work.
    Lifecycle,
    /// Coordinator-driven money transfers between children (pa2/pa3).
    Bank,
    /// Each child runs its `5 * id`-operation work loop, optionally guarded
    /// by mutual exclusion (pa4/pa5).
    Mutex,
}

/// Mutual-exclusion algorithm selected when `--variant mutex --mutexl` is
/// given. Ignored otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MutexAlgo {
    /// Lamport's queue-and-release algorithm (pa4).
    Lamport,
    /// Ricart-Agrawala with deferred replies (pa5).
    Ricart,
}

#[derive(Parser, Debug)]
#[command(name = "peerlab", about = "Didactic distributed-processes laboratory")]
pub struct Args {
    /// Number of child processes (N). Total peer count is N + 1, including
    /// the coordinator.
    #[arg(short = 'p', long = "p")]
    pub n: i8,

    /// Which protocol runs after the start barrier.
    #[arg(long, value_enum, default_value_t = Variant::Lifecycle)]
    pub variant: Variant,

    /// Use a mutual-exclusion algorithm to guard each child's work loop.
    /// Only meaningful with `--variant mutex`; without it children run the
    /// same work loop uncoordinated.
    #[arg(long)]
    pub mutexl: bool,

    /// Which algorithm `--mutexl` selects.
    #[arg(long, value_enum, default_value_t = MutexAlgo::Lamport)]
    pub mutex_algo: MutexAlgo,

    /// Initial balances for children 1..=N, in order. Only meaningful with
    /// `--variant bank`; must supply exactly N values when given.
    pub balances: Vec<i16>,

    /// Directory to append `pipes.log` and `events.log` to. Defaults to the
    /// current directory.
    #[arg(long, default_value = ".")]
    pub log_dir: std::path::PathBuf,
}

impl Args {
    pub fn mutex_variant(&self) -> MutexVariant {
        if self.variant != Variant::Mutex || !self.mutexl {
            return MutexVariant::None;
        }
        match self.mutex_algo {
            MutexAlgo::Lamport => MutexVariant::LamportQueue,
            MutexAlgo::Ricart => MutexVariant::RicartAgrawala,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Variant::Lifecycle => "lifecycle",
            Variant::Bank => "bank",
            Variant::Mutex => "mutex",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for MutexAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MutexAlgo::Lamport => "lamport",
            MutexAlgo::Ricart => "ricart",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutex_variant_is_none_unless_variant_is_mutex_and_mutexl_is_set() {
        let mut args = Args {
            n: 3,
            variant: Variant::Lifecycle,
            mutexl: true,
            mutex_algo: MutexAlgo::Lamport,
            balances: vec![],
            log_dir: ".".into(),
        };
        assert_eq!(args.mutex_variant(), MutexVariant::None);

        args.variant = Variant::Mutex;
        args.mutexl = false;
        assert_eq!(args.mutex_variant(), MutexVariant::None);

        args.mutexl = true;
        assert_eq!(args.mutex_variant(), MutexVariant::LamportQueue);

        args.mutex_algo = MutexAlgo::Ricart;
        assert_eq!(args.mutex_variant(), MutexVariant::RicartAgrawala);
    }
}
