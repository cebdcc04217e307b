use color_probe_common::color::Color;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::controller::{CaptureController, CaptureError};
use super::report::ReportedState;
use super::scheduler::Tick;

enum Command {
    Start(oneshot::Sender<Result<(), CaptureError>>),
    Pause(oneshot::Sender<Result<(), CaptureError>>),
    Resume(oneshot::Sender<Result<(), CaptureError>>),
    Stop(oneshot::Sender<Result<(), CaptureError>>),
    SetTarget(Color, oneshot::Sender<Result<(), CaptureError>>),
}

/// Cloneable front end to a controller running in its own task.
///
/// Commands queue up and are applied one at a time; the published state is
/// read from a `watch` channel without touching the controller.
#[derive(Clone)]
pub struct CaptureHandle {
    commands: mpsc::Sender<Command>,
    reports: watch::Receiver<ReportedState>,
}

impl CaptureHandle {
    pub async fn start(&self) -> Result<(), CaptureError> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<(), CaptureError> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), CaptureError> {
        self.request(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<(), CaptureError> {
        self.request(Command::Stop).await
    }

    pub async fn set_target(&self, target: Color) -> Result<(), CaptureError> {
        self.request(|reply| Command::SetTarget(target, reply)).await
    }

    /// The most recently published state.
    pub fn snapshot(&self) -> ReportedState {
        self.reports.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportedState> {
        self.reports.clone()
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<(), CaptureError>>) -> Command,
    ) -> Result<(), CaptureError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| CaptureError::ControllerClosed)?;
        reply_rx.await.map_err(|_| CaptureError::ControllerClosed)?
    }
}

/// Move `controller` into its own task. The task exits, stopping capture,
/// once every [`CaptureHandle`] is dropped.
pub fn spawn_controller(
    controller: CaptureController,
    ticks: mpsc::UnboundedReceiver<Tick>,
) -> (CaptureHandle, JoinHandle<()>) {
    let (commands, command_rx) = mpsc::channel(16);
    let handle = CaptureHandle {
        commands,
        reports: controller.subscribe(),
    };
    let task = tokio::spawn(run_controller(controller, command_rx, ticks));
    (handle, task)
}

async fn run_controller(
    mut controller: CaptureController,
    mut commands: mpsc::Receiver<Command>,
    mut ticks: mpsc::UnboundedReceiver<Tick>,
) {
    info!("capture controller running");
    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(cmd) => apply(&mut controller, cmd),
                None => break,
            },
            Some(tick) = ticks.recv() => controller.handle_tick(tick),
        }
    }

    if controller.stop().is_ok() {
        debug!("capture stopped on shutdown");
    }
    info!("capture controller exited");
}

fn apply(controller: &mut CaptureController, cmd: Command) {
    // A dropped reply receiver just means the caller stopped waiting.
    match cmd {
        Command::Start(reply) => {
            let _ = reply.send(controller.start());
        }
        Command::Pause(reply) => {
            let _ = reply.send(controller.pause());
        }
        Command::Resume(reply) => {
            let _ = reply.send(controller.resume());
        }
        Command::Stop(reply) => {
            let _ = reply.send(controller.stop());
        }
        Command::SetTarget(target, reply) => {
            controller.set_target(target);
            let _ = reply.send(Ok(()));
        }
    }
}
