use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info};

use crate::sources::Track;

/// Cola de reproducción de un guild con su cursor y flags de modo.
///
/// El cursor (`next_index`) apunta al próximo track a reproducir. Puede
/// quedar fuera de rango tras un `remove`; se normaliza cada vez que se
/// consulta (fuera de rango vuelve a 0), nunca se indexa con él sin más.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: Vec<Track>,
    next_index: usize,
    persist: bool,
    shuffle: bool,
    max_size: usize,
    rng: StdRng,
}

impl PlaybackQueue {
    pub fn new(max_size: usize) -> Self {
        Self::with_rng(max_size, StdRng::from_entropy())
    }

    pub fn with_rng(max_size: usize, rng: StdRng) -> Self {
        Self {
            items: Vec::new(),
            next_index: 0,
            persist: false,
            shuffle: false,
            max_size,
            rng,
        }
    }

    /// Agrega un track al final. Devuelve `false` si la cola está llena.
    pub fn push(&mut self, track: Track) -> bool {
        if self.items.len() >= self.max_size {
            return false;
        }

        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push(track);
        true
    }

    /// Elimina un track específico conservando el orden del resto
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.items.len() {
            return None;
        }

        let removed = self.items.remove(index);
        debug!("❌ Track eliminado en posición {}", index);
        Some(removed)
    }

    /// Saca el próximo track según cursor y modos, y avanza el cursor.
    ///
    /// Sin `persist` el track sale de la cola y su sucesor ocupa su posición,
    /// así que el cursor avanza quedándose en el mismo índice. Con `persist`
    /// el track permanece y el cursor pasa al siguiente, rotando al final.
    pub fn take_next(&mut self) -> Option<Track> {
        if self.is_empty() {
            return None;
        }

        let index = self.cursor();
        let track = if self.persist {
            self.items[index].clone()
        } else {
            self.items.remove(index)
        };

        self.next_index = if self.shuffle {
            self.random_index()
        } else if self.persist {
            index + 1
        } else {
            index
        };

        Some(track)
    }

    /// Fija el cursor. El índice debe ser válido para la cola actual.
    pub fn set_next_index(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.next_index = index;
        true
    }

    /// Cursor aleatorio uniforme en `[0, len)`; no hace nada con la cola vacía
    pub fn randomize_next(&mut self) {
        if !self.is_empty() {
            self.next_index = self.random_index();
        }
    }

    /// Cambia el modo de shuffle
    pub fn toggle_shuffle(&mut self) -> bool {
        self.set_shuffle(!self.shuffle)
    }

    pub fn set_shuffle(&mut self, enabled: bool) -> bool {
        self.shuffle = enabled;
        if enabled {
            self.randomize_next();
            info!("🔀 Modo aleatorio activado");
        } else {
            info!("➡️ Modo aleatorio desactivado");
        }
        self.shuffle
    }

    /// Cambia el modo persistente (los tracks reproducidos se quedan en la cola)
    pub fn toggle_persist(&mut self) -> bool {
        self.set_persist(!self.persist)
    }

    pub fn set_persist(&mut self, enabled: bool) -> bool {
        self.persist = enabled;
        if enabled {
            info!("🔁 Cola persistente activada");
        } else {
            info!("➡️ Cola persistente desactivada");
        }
        self.persist
    }

    /// Cursor normalizado a `[0, len)`; 0 con la cola vacía
    pub fn cursor(&self) -> usize {
        if self.next_index < self.items.len() {
            self.next_index
        } else {
            0
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn persist(&self) -> bool {
        self.persist
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    fn random_index(&mut self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.rng.gen_range(0..self.items.len())
        }
    }
}
