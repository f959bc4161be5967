use serenity::model::id::{ChannelId, GuildId};
use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, warn, Instrument};

use super::{
    pipeline::{Pipeline, PipelineStatus},
    queue::PlaybackQueue,
    registry::RegistryLink,
    voice::VoiceBinding,
};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::{Track, TrackResolver},
};

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Eventos que el actor procesa en orden, uno a la vez.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Pause,
    Resume,
    Kill,
    /// Avanza al siguiente track. `index` tiene prioridad sobre `random`.
    Next { index: Option<usize>, random: bool },
    Enqueue { track: Track },
    Remove { index: usize },
}

/// Mensajes del mailbox: eventos sin respuesta y consultas con respuesta.
enum Request {
    Event(PlayerEvent),
    ToggleShuffle(oneshot::Sender<bool>),
    TogglePersist(oneshot::Sender<bool>),
    SetShuffle(bool, oneshot::Sender<bool>),
    SetPersist(bool, oneshot::Sender<bool>),
    Status(oneshot::Sender<PlayerStatus>),
}

/// Ajustes comunes a todos los players del proceso
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub max_queue_size: usize,
    /// Intervalo del chequeo de fin de pipeline
    pub tick_interval: Duration,
    /// Quitar el player del registro cuando el pipeline termina con error
    pub deregister_on_error: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            tick_interval: Duration::from_secs(1),
            deregister_on_error: false,
        }
    }
}

/// Foto del estado de un player
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub paused: bool,
    pub position: Duration,
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub next_index: usize,
    pub shuffle: bool,
    pub persist: bool,
    pub channel_id: Option<ChannelId>,
}

/// Handle clonable hacia el actor de un guild.
///
/// Todas las operaciones pasan por el mismo mailbox, por lo que se observan
/// en el orden en que se enviaron.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerHandle>,
}

struct PlayerHandle {
    id: u64,
    guild_id: GuildId,
    mailbox: mpsc::UnboundedSender<Request>,
}

impl Player {
    /// Crea el actor y lo lanza en su propia task
    pub(super) fn spawn(
        guild_id: GuildId,
        binding: Arc<dyn VoiceBinding>,
        settings: PlayerSettings,
        registry: RegistryLink,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed);

        let actor = PlayerActor {
            id,
            guild_id,
            queue: PlaybackQueue::new(settings.max_queue_size),
            binding,
            current: None,
            settings,
            registry,
        };

        let span = tracing::info_span!("player", guild = %guild_id);
        tokio::spawn(actor.run(rx).instrument(span));

        Self {
            inner: Arc::new(PlayerHandle {
                id,
                guild_id,
                mailbox: tx,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.inner.guild_id
    }

    #[cfg(test)]
    pub fn same_as(&self, other: &Player) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// `false` una vez que el loop del actor terminó
    pub fn is_running(&self) -> bool {
        !self.inner.mailbox.is_closed()
    }

    pub fn send(&self, event: PlayerEvent) -> PlayerResult<()> {
        self.inner
            .mailbox
            .send(Request::Event(event))
            .map_err(|_| PlayerError::NotRunning(self.guild_id()))
    }

    /// Mata el player. Idempotente: sobre un player ya detenido no hace nada.
    pub fn kill(&self) {
        if self.send(PlayerEvent::Kill).is_err() {
            debug!("Player de guild {} ya estaba detenido", self.guild_id());
        }
    }

    /// Resuelve el locator en la task del llamador y encola el resultado.
    pub async fn queue_up(&self, resolver: &dyn TrackResolver, locator: &str) -> PlayerResult<Track> {
        if !self.is_running() {
            return Err(PlayerError::NotRunning(self.guild_id()));
        }

        let track = resolver.resolve(locator).await?;
        info!("📤 Enviando {} al player...", track.title());
        self.send(PlayerEvent::Enqueue { track: track.clone() })?;
        Ok(track)
    }

    pub async fn toggle_shuffle(&self) -> PlayerResult<bool> {
        self.request(Request::ToggleShuffle).await
    }

    pub async fn toggle_persist(&self) -> PlayerResult<bool> {
        self.request(Request::TogglePersist).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> PlayerResult<bool> {
        self.request(|reply| Request::SetShuffle(enabled, reply)).await
    }

    pub async fn set_persist(&self, enabled: bool) -> PlayerResult<bool> {
        self.request(|reply| Request::SetPersist(enabled, reply)).await
    }

    pub async fn status(&self) -> PlayerResult<PlayerStatus> {
        self.request(Request::Status).await
    }

    /// Espera a que el loop del actor termine
    pub async fn closed(&self) {
        self.inner.mailbox.closed().await;
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> PlayerResult<T> {
        let (reply, response) = oneshot::channel();
        self.inner
            .mailbox
            .send(make(reply))
            .map_err(|_| PlayerError::NotRunning(self.guild_id()))?;
        response.await.map_err(|_| PlayerError::NotRunning(self.guild_id()))
    }
}

/// Dueño exclusivo del estado de reproducción de un guild.
struct PlayerActor {
    id: u64,
    guild_id: GuildId,
    queue: PlaybackQueue,
    binding: Arc<dyn VoiceBinding>,
    current: Option<Pipeline>,
    settings: PlayerSettings,
    registry: RegistryLink,
}

impl PlayerActor {
    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Request>) {
        info!("⏳ Esperando conexión de voz...");
        self.binding.ready().await;
        info!("🔊 Conexión de voz lista");

        let mut ticker = time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let flow = tokio::select! {
                _ = ticker.tick() => self.check_pipeline().await,
                request = mailbox.recv() => match request {
                    Some(request) => self.dispatch(request).await,
                    None => {
                        // Todos los handles se soltaron: no queda quien lo controle
                        self.kill().await;
                        ControlFlow::Break(())
                    }
                },
            };

            if flow.is_break() {
                break;
            }
        }

        info!("👋 Loop del player terminado");
    }

    async fn dispatch(&mut self, request: Request) -> ControlFlow<()> {
        match request {
            Request::Event(event) => return self.handle_event(event).await,
            Request::ToggleShuffle(reply) => {
                let _ = reply.send(self.queue.toggle_shuffle());
            }
            Request::TogglePersist(reply) => {
                let _ = reply.send(self.queue.toggle_persist());
            }
            Request::SetShuffle(enabled, reply) => {
                let _ = reply.send(self.queue.set_shuffle(enabled));
            }
            Request::SetPersist(enabled, reply) => {
                let _ = reply.send(self.queue.set_persist(enabled));
            }
            Request::Status(reply) => {
                let _ = reply.send(self.status().await);
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_event(&mut self, event: PlayerEvent) -> ControlFlow<()> {
        match event {
            PlayerEvent::Pause => {
                if let Some(pipeline) = &self.current {
                    pipeline.set_running(false);
                    info!("⏸️ Reproducción pausada");
                }
            }
            PlayerEvent::Resume => {
                if let Some(pipeline) = &self.current {
                    pipeline.set_running(true);
                    info!("▶️ Reproducción reanudada");
                }
            }
            PlayerEvent::Kill => {
                self.kill().await;
                return ControlFlow::Break(());
            }
            PlayerEvent::Next { index, random } => {
                match index {
                    Some(index) if !self.queue.set_next_index(index) => {
                        warn!("⚠️ Índice {} fuera de rango (cola de {})", index, self.queue.len());
                        return ControlFlow::Continue(());
                    }
                    Some(_) => {}
                    None if random => self.queue.randomize_next(),
                    None => {}
                }
                self.play_next().await;
            }
            PlayerEvent::Enqueue { track } => {
                if self.queue.is_full() {
                    warn!(
                        "🚫 Cola llena (máximo {} canciones), descartando: {}",
                        self.queue.max_size(),
                        track.title()
                    );
                    return ControlFlow::Continue(());
                }

                self.queue.push(track);
                if self.current.is_none() {
                    self.play_next().await;
                }
            }
            PlayerEvent::Remove { index } => {
                if self.queue.remove(index).is_none() {
                    warn!("⚠️ Intento de eliminar fuera de rango: {} (cola de {})", index, self.queue.len());
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Desmonta el pipeline actual y arranca el siguiente track de la cola.
    async fn play_next(&mut self) {
        if let Some(pipeline) = self.current.take() {
            pipeline.stop();
        }

        let Some(track) = self.queue.take_next() else {
            debug!("📭 Cola vacía, el player queda inactivo");
            return;
        };

        info!("🎵 Reproduciendo: {}", track.title());
        match Pipeline::start(track, self.binding.as_ref()).await {
            Ok(pipeline) => self.current = Some(pipeline),
            Err(e) => error!("❌ No se pudo iniciar la reproducción: {}", e),
        }
    }

    /// Tick de un segundo: detecta el fin del pipeline actual.
    async fn check_pipeline(&mut self) -> ControlFlow<()> {
        let Some(pipeline) = &self.current else {
            return ControlFlow::Continue(());
        };

        match pipeline.poll_status().await {
            PipelineStatus::Running => ControlFlow::Continue(()),
            PipelineStatus::Finished => {
                debug!("Track terminado, reproduciendo siguiente...");
                self.play_next().await;
                ControlFlow::Continue(())
            }
            PipelineStatus::Failed(reason) => {
                error!("❌ Error en el pipeline: {}", reason);
                if let Some(pipeline) = self.current.take() {
                    pipeline.stop();
                }
                self.disconnect().await;

                if self.settings.deregister_on_error {
                    self.registry.remove(self.guild_id, self.id);
                } else {
                    // El registro conserva la entrada hasta un Kill explícito
                    warn!("⚠️ Player detenido por error; sigue registrado en guild {}", self.guild_id);
                }
                ControlFlow::Break(())
            }
        }
    }

    async fn kill(&mut self) {
        if let Some(pipeline) = self.current.take() {
            pipeline.stop();
        }
        self.disconnect().await;
        self.registry.remove(self.guild_id, self.id);
        info!("💀 Player eliminado");
    }

    async fn disconnect(&self) {
        if let Err(e) = self.binding.disconnect().await {
            warn!("Error al desconectar: {}", e);
        }
    }

    async fn status(&self) -> PlayerStatus {
        let (paused, position) = match &self.current {
            Some(pipeline) => (pipeline.paused().await, pipeline.position().await),
            None => (true, Duration::ZERO),
        };

        PlayerStatus {
            paused,
            position,
            current: self.current.as_ref().map(|p| p.track().clone()),
            queue: self.queue.tracks().to_vec(),
            next_index: self.queue.cursor(),
            shuffle: self.queue.shuffle(),
            persist: self.queue.persist(),
            channel_id: self.binding.channel_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{channel, guild, ids, registry, track};
    use pretty_assertions::assert_eq;

    fn current_id(status: &PlayerStatus) -> Option<String> {
        status.current.as_ref().map(|t| t.id().to_string())
    }

    async fn settle() {
        // Deja pasar al menos un tick del actor
        time::sleep(Duration::from_millis(1500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_scenario_with_small_capacity() {
        let (registry, transport) = registry(2);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();

        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("a".into()));
        assert!(status.queue.is_empty());

        player.send(PlayerEvent::Enqueue { track: track("b") }).unwrap();
        player.send(PlayerEvent::Enqueue { track: track("c") }).unwrap();
        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("a".into()));
        assert_eq!(ids(&status.queue), vec!["b", "c"]);

        player.send(PlayerEvent::Next { index: None, random: false }).unwrap();
        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("b".into()));
        assert_eq!(ids(&status.queue), vec!["c"]);
        assert_eq!(status.next_index, 0);

        let binding = transport.binding(0);
        assert!(binding.session(0).is_stopped());
        assert_eq!(binding.session_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_beyond_capacity_is_dropped() {
        let (registry, _transport) = registry(2);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();

        for name in ["a", "b", "c", "d", "e"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }

        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("a".into()));
        assert_eq!(ids(&status.queue), vec!["b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_without_persist_consumes_queue() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        for name in ["a", "b", "c"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }
        assert_eq!(player.status().await.unwrap().queue.len(), 2);

        transport.binding(0).session(0).finish();
        settle().await;

        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("b".into()));
        assert_eq!(ids(&status.queue), vec!["c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_with_persist_keeps_played_track() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        assert!(player.toggle_persist().await.unwrap());

        for name in ["a", "b", "c"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }
        let before = player.status().await.unwrap();
        assert_eq!(ids(&before.queue), vec!["a", "b", "c"]);

        transport.binding(0).session(0).finish();
        settle().await;

        let after = player.status().await.unwrap();
        assert_eq!(current_id(&after), Some("b".into()));
        assert_eq!(ids(&after.queue), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_runs_dry_and_goes_idle() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        player.status().await.unwrap();

        transport.binding(0).session(0).finish();
        settle().await;

        let status = player.status().await.unwrap();
        assert!(status.current.is_none());
        assert!(status.paused);
        assert_eq!(status.position, Duration::ZERO);
        assert!(player.is_running());

        // Con el player inactivo el próximo enqueue arranca solo
        player.send(PlayerEvent::Enqueue { track: track("b") }).unwrap();
        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("b".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_toggle_the_streamer() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();

        // Sin pipeline son no-ops
        player.send(PlayerEvent::Pause).unwrap();
        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        assert!(!player.status().await.unwrap().paused);

        let session = transport.binding(0).session(0);
        session.set_position(Duration::from_secs(42));

        player.send(PlayerEvent::Pause).unwrap();
        let status = player.status().await.unwrap();
        assert!(status.paused);
        assert_eq!(status.position, Duration::from_secs(42));
        assert!(!session.is_running());

        player.send(PlayerEvent::Resume).unwrap();
        assert!(!player.status().await.unwrap().paused);
        assert!(session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_with_explicit_index_and_out_of_range() {
        let (registry, _transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        for name in ["a", "b", "c", "d"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }

        player.send(PlayerEvent::Next { index: Some(2), random: true }).unwrap();
        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("d".into()));
        assert_eq!(ids(&status.queue), vec!["b", "c"]);

        player.send(PlayerEvent::Next { index: Some(5), random: false }).unwrap();
        let status = player.status().await.unwrap();
        assert_eq!(current_id(&status), Some("d".into()));
        assert_eq!(ids(&status.queue), vec!["b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_next_picks_from_queue() {
        let (registry, _transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        for name in ["a", "b", "c", "d"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }

        player.send(PlayerEvent::Next { index: None, random: true }).unwrap();
        let status = player.status().await.unwrap();
        let current = current_id(&status).unwrap();
        assert!(["b", "c", "d"].contains(&current.as_str()));
        assert_eq!(status.queue.len(), 2);
        assert!(!ids(&status.queue).contains(&current));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_event_bounds() {
        let (registry, _transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        for name in ["a", "b", "c", "d"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }

        player.send(PlayerEvent::Remove { index: 3 }).unwrap();
        assert_eq!(ids(&player.status().await.unwrap().queue), vec!["b", "c", "d"]);

        player.send(PlayerEvent::Remove { index: 1 }).unwrap();
        assert_eq!(ids(&player.status().await.unwrap().queue), vec!["b", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggling_shuffle_randomizes_within_bounds() {
        let (registry, _transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            player.send(PlayerEvent::Enqueue { track: track(name) }).unwrap();
        }

        assert!(player.toggle_shuffle().await.unwrap());
        let status = player.status().await.unwrap();
        assert!(status.shuffle);
        assert!(status.next_index < status.queue.len());

        assert!(!player.toggle_shuffle().await.unwrap());
        assert!(player.set_shuffle(true).await.unwrap());
        assert!(player.set_persist(true).await.unwrap());
        let status = player.status().await.unwrap();
        assert!(status.shuffle && status.persist);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_error_disconnects_but_keeps_entry_by_default() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        player.status().await.unwrap();

        transport.binding(0).session(0).fail("stream reset");
        player.closed().await;

        assert!(!player.is_running());
        assert_eq!(transport.binding(0).disconnect_count(), 1);
        assert!(transport.binding(0).session(0).is_stopped());
        assert!(registry.get(guild()).is_some());
        assert!(matches!(player.status().await, Err(PlayerError::NotRunning(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_error_deregisters_when_configured() {
        let transport = crate::audio::testing::FakeTransport::new();
        let settings = PlayerSettings {
            deregister_on_error: true,
            ..PlayerSettings::default()
        };
        let registry = crate::audio::registry::PlayerRegistry::new(transport.clone(), settings);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        player.status().await.unwrap();

        transport.binding(0).session(0).fail("stream reset");
        player.closed().await;

        assert!(registry.get(guild()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_leaves_player_idle() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        transport.binding(0).fail_next_stream();

        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        let status = player.status().await.unwrap();
        assert!(status.current.is_none());
        assert!(status.queue.is_empty());
        assert!(player.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_is_idempotent_and_deregisters() {
        let (registry, transport) = registry(10);
        let player = registry.get_or_create(guild(), channel()).await.unwrap();
        player.send(PlayerEvent::Enqueue { track: track("a") }).unwrap();
        player.status().await.unwrap();

        player.kill();
        player.closed().await;
        player.kill();

        assert!(registry.get(guild()).is_none());
        assert_eq!(transport.binding(0).disconnect_count(), 1);
        assert!(transport.binding(0).session(0).is_stopped());
        assert!(matches!(
            player.send(PlayerEvent::Resume),
            Err(PlayerError::NotRunning(_))
        ));
    }
}
