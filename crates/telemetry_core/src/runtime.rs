//! Thread dona do [`Supervisor`].
//!
//! Serializa as três fontes assíncronas (comandos da UI, eventos do
//! transporte, ticks do timer de verificação) numa única thread, então o
//! supervisor nunca é tocado por duas delas ao mesmo tempo. O timer só existe
//! enquanto há verificação pendente e é recriado quando a geração muda.

use crate::config::AppConfig;
use crate::export::{ExportReport, Exporter};
use crate::supervisor::{Supervisor, SupervisorEvent};
use crate::transport::{Transport, TransportEvent};
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Ação pedida pela camada de apresentação.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    BeginCheck,
    EndCheck,
    Start,
    Stop,
    Clear,
    Export { file_name: String },
    Shutdown,
}

/// Mensagem enviada da thread do supervisor para a UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Event(SupervisorEvent),
    Exported(ExportReport),
    CommandFailed(String),
}

/// Alça da thread do supervisor. Ao ser descartada, encerra a thread e
/// libera todas as sessões.
pub struct SupervisorHandle {
    commands: Sender<Command>,
    updates: Receiver<Update>,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Envia um comando. Retorna `false` se a thread já terminou.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn updates(&self) -> &Receiver<Update> {
        &self.updates
    }

    /// Encerra a thread e espera ela terminar.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Thread do supervisor terminou em pânico");
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

/// Inicia a thread do supervisor.
pub fn spawn<T>(
    config: &AppConfig,
    transport: T,
    transport_events: Receiver<TransportEvent>,
    exporter: Box<dyn Exporter + Send>,
) -> std::io::Result<SupervisorHandle>
where
    T: Transport + Send + 'static,
{
    let (cmd_tx, cmd_rx) = unbounded::<Command>();
    // Sem limite: a UI espelha o histórico, nenhuma leitura pode se perder
    let (upd_tx, upd_rx) = unbounded::<Update>();

    let config = config.clone();
    let poll_interval = config.session.poll_interval();

    let thread = std::thread::Builder::new()
        .name("supervisor".into())
        .spawn(move || {
            let supervisor = Supervisor::new(&config, transport);
            run(supervisor, cmd_rx, transport_events, upd_tx, exporter, poll_interval);
        })?;

    Ok(SupervisorHandle {
        commands: cmd_tx,
        updates: upd_rx,
        thread: Some(thread),
    })
}

fn run<T: Transport>(
    mut supervisor: Supervisor<T>,
    commands: Receiver<Command>,
    mut transport_events: Receiver<TransportEvent>,
    updates: Sender<Update>,
    exporter: Box<dyn Exporter + Send>,
    poll_interval: Duration,
) {
    info!("Supervisor iniciado");
    let mut timer: Option<(u64, Receiver<Instant>)> = None;

    loop {
        sync_timer(&supervisor, &mut timer, poll_interval);
        let idle = crossbeam_channel::never();
        let ticks = timer.as_ref().map_or(&idle, |(_, rx)| rx);
        let tick_generation = timer.as_ref().map(|(generation, _)| *generation);
        let mut transport_closed = false;

        select! {
            recv(commands) -> command => match command {
                Ok(Command::Shutdown) | Err(_) => break,
                Ok(command) => apply(&mut supervisor, command, exporter.as_ref(), &updates),
            },
            recv(transport_events) -> event => match event {
                Ok(event) => supervisor.handle_event(event),
                Err(_) => transport_closed = true,
            },
            recv(ticks) -> _ => {
                if let Some(generation) = tick_generation {
                    supervisor.on_poll_tick(generation);
                }
            },
        }

        if transport_closed {
            warn!("Canal do transporte fechado");
            transport_events = crossbeam_channel::never();
        }
        forward(&mut supervisor, &updates);
    }

    supervisor.shutdown();
    forward(&mut supervisor, &updates);
    info!("Supervisor encerrado");
}

/// Mantém o timer alinhado com a verificação atual: um timer por geração,
/// descartado assim que a geração deixa de precisar de pedidos de verificação.
fn sync_timer<T: Transport>(
    supervisor: &Supervisor<T>,
    timer: &mut Option<(u64, Receiver<Instant>)>,
    interval: Duration,
) {
    let wanted = supervisor.poll_generation();
    let current = timer.as_ref().map(|(generation, _)| *generation);
    if wanted == current {
        return;
    }
    *timer = wanted.map(|generation| {
        debug!("Timer de verificação armado (geração {generation})");
        (generation, crossbeam_channel::tick(interval))
    });
}

fn apply<T: Transport>(
    supervisor: &mut Supervisor<T>,
    command: Command,
    exporter: &dyn Exporter,
    updates: &Sender<Update>,
) {
    debug!("Comando: {command:?}");
    let result = match command {
        Command::BeginCheck => supervisor.begin_liveness_check(),
        Command::EndCheck => {
            supervisor.end_liveness_check();
            Ok(())
        }
        Command::Start => supervisor.start(),
        Command::Stop => {
            supervisor.stop();
            Ok(())
        }
        Command::Clear => {
            supervisor.clear();
            Ok(())
        }
        Command::Export { file_name } => supervisor
            .export(exporter, &file_name)
            .map(|report| {
                let _ = updates.send(Update::Exported(report));
            }),
        Command::Shutdown => Ok(()),
    };

    if let Err(e) = result {
        let _ = updates.send(Update::CommandFailed(e.to_string()));
    }
}

fn forward<T: Transport>(supervisor: &mut Supervisor<T>, updates: &Sender<Update>) {
    for event in supervisor.drain_events() {
        if updates.send(Update::Event(event)).is_err() {
            debug!("UI desconectada, descartando atualização");
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
