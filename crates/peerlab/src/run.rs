//! The fork loop: argument validation, log file setup, pipe mesh
//! construction, and process forking. Everything the spec calls out as
//! "out of scope" for the core library (§1, §4.3's `[AMBIENT] Driver
//! responsibility`) lives here; it calls into `peerlab-transport` for the
//! mesh and `crate::variant` for the protocol dispatch.

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use peerlab_core::{ChannelError, CoreError, PeerConfig, Role, UsageError, COORDINATOR_ID};
use peerlab_eventlog::EventLog;
use peerlab_transport::{PipeMatrix, ProcessEndpoint};

use crate::cli::{Args, Variant};
use crate::variant;

/// Runs the whole lab for one invocation of `peerlab`, returning the
/// process exit code (spec §6: 0 on success, non-zero on any protocol or
/// usage error).
pub fn run(args: Args) -> i32 {
    match run_inner(args) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "peerlab run failed");
            1
        }
    }
}

fn validate(args: &Args) -> Result<(), CoreError> {
    if args.n < 1 {
        return Err(UsageError::InvalidArgument("-p must be at least 1".into()).into());
    }
    if args.variant == Variant::Bank
        && !args.balances.is_empty()
        && args.balances.len() != args.n as usize
    {
        return Err(UsageError::InvalidArgument(format!(
            "bank variant expects {} initial balances (one per child), got {}",
            args.n,
            args.balances.len()
        ))
        .into());
    }
    Ok(())
}

/// Runs one peer's entire lifecycle to completion and logs the channel
/// closure trail, regardless of whether the run succeeded.
fn run_peer(
    mut endpoint: ProcessEndpoint,
    log: &mut EventLog,
    args: &Args,
    config: &PeerConfig,
    pid: u32,
    parent_pid: u32,
) -> Result<(), CoreError> {
    endpoint.enable_polling().map_err(ChannelError::from)?;
    let result = if endpoint.role() == Role::Coordinator {
        variant::run_coordinator(&mut endpoint, args.variant, config)
    } else {
        variant::run_child(&mut endpoint, log, args.variant, config, pid, parent_pid)
    };
    endpoint.log_close(log);
    result
}

fn run_inner(args: Args) -> Result<(), CoreError> {
    validate(&args)?;

    std::fs::create_dir_all(&args.log_dir)?;
    let mut log = EventLog::open(&args.log_dir)?;

    let total_peers = args.n + 1;
    let mut matrix = Some(PipeMatrix::open(total_peers, &mut log)?);

    let config = PeerConfig {
        role: Role::Coordinator,
        local_id: COORDINATOR_ID,
        n: args.n,
        mutex_variant: args.mutex_variant(),
        initial_balances: args.balances.clone(),
    };

    let coordinator_pid = std::process::id();
    let mut child_pids: Vec<Pid> = Vec::with_capacity(args.n as usize);

    for id in 1..total_peers {
        // SAFETY: no threads exist in this process yet at any point this
        // loop runs — every `fork()` below happens from the single-threaded
        // coordinator, before it has spawned anything else of its own.
        let outcome = unsafe { fork() }
            .map_err(|errno| ChannelError::Io(std::io::Error::from_raw_os_error(errno as i32)))?;
        match outcome {
            ForkResult::Parent { child } => child_pids.push(child),
            ForkResult::Child => {
                let channels = matrix
                    .take()
                    .expect("pipe matrix present in freshly forked child")
                    .extract(id, &mut log);
                let endpoint = ProcessEndpoint::new(channels, total_peers, Role::Child);

                let mut child_config = config.clone();
                child_config.role = Role::Child;
                child_config.local_id = id;

                let pid = std::process::id();
                let result = run_peer(endpoint, &mut log, &args, &child_config, pid, coordinator_pid);
                std::process::exit(if result.is_ok() { 0 } else { 1 });
            }
        }
    }

    let channels = matrix
        .take()
        .expect("pipe matrix present in coordinator after forking every child")
        .extract(COORDINATOR_ID, &mut log);
    let endpoint = ProcessEndpoint::new(channels, total_peers, Role::Coordinator);
    let result = run_peer(endpoint, &mut log, &args, &config, coordinator_pid, 0);

    let mut any_child_failed = false;
    for pid in child_pids {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, 0)) => {}
            _ => any_child_failed = true,
        }
    }

    result?;
    if any_child_failed {
        return Err(ChannelError::AllChannelsClosed.into());
    }
    Ok(())
}
