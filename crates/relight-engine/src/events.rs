//! Subscriber lists for engine events.

use glam::Vec3;
use relight_tiles::Position;

type Listener<T> = Box<dyn FnMut(&T)>;

/// Callbacks registered on an engine.
#[derive(Default)]
pub(crate) struct Listeners {
    ready: Vec<Box<dyn FnMut()>>,
    position: Vec<Listener<Position>>,
    light: Vec<Listener<Vec3>>,
}

impl Listeners {
    pub fn on_ready(&mut self, f: impl FnMut() + 'static) {
        self.ready.push(Box::new(f));
    }

    pub fn on_position_change(&mut self, f: impl FnMut(&Position) + 'static) {
        self.position.push(Box::new(f));
    }

    pub fn on_light_change(&mut self, f: impl FnMut(&Vec3) + 'static) {
        self.light.push(Box::new(f));
    }

    pub fn ready(&mut self) {
        self.ready.iter_mut().for_each(|f| f());
    }

    pub fn position_changed(&mut self, position: &Position) {
        self.position.iter_mut().for_each(|f| f(position));
    }

    pub fn light_changed(&mut self, light: &Vec3) {
        self.light.iter_mut().for_each(|f| f(light));
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("ready", &self.ready.len())
            .field("position", &self.position.len())
            .field("light", &self.light.len())
            .finish()
    }
}
