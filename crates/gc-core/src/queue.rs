use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// File FIFO bornée et bloquante avec fermeture collante.
///
/// `push` bloque quand la file est pleine, `pop` bloque quand elle est
/// vide ; les deux sont débloqués par `close`. Après fermeture, aucun push
/// n'est accepté ; `pop` draine le reste puis retourne `None` (fin de flux).
///
/// C'est l'unique mécanisme de backpressure du pipeline : un consommateur
/// lent bloque son producteur, jusqu'au démuxeur.
///
/// # Example
/// ```
/// use gc_core::queue::BoundedQueue;
/// let queue = BoundedQueue::new(2);
/// assert!(queue.push(1));
/// assert!(queue.push(2));
/// queue.close();
/// assert!(!queue.push(3));
/// assert_eq!(queue.pop(), Some(1));
/// assert_eq!(queue.pop(), Some(2));
/// assert_eq!(queue.pop(), None);
/// ```
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> BoundedQueue<T> {
    /// Crée une file de capacité fixe (≥ 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enfile un élément. Bloque tant que la file est pleine et ouverte.
    ///
    /// Retourne `false` si la file est (ou devient) fermée ; l'élément est
    /// alors abandonné.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while inner.items.len() >= self.capacity && !inner.closed {
            inner = self
                .not_full
                .wait(inner)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        if inner.closed {
            return false;
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        true
    }

    /// Défile le prochain élément. Bloque tant que la file est vide et
    /// ouverte. Retourne `None` une fois la file fermée et drainée.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while inner.items.is_empty() && !inner.closed {
            inner = self
                .not_empty
                .wait(inner)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        let item = inner.items.pop_front();
        drop(inner);
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Ferme la file (collant). Tous les waiters bloqués sont libérés :
    /// les push en attente échouent, les pop drainent puis voient `None`.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.closed = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Nombre d'éléments actuellement en file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .items
            .len()
    }

    /// `true` si la file est vide.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` si `close` a été appelé.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn fifo_order_preserved() {
        let queue = BoundedQueue::new(8);
        for i in 0..8 {
            assert!(queue.push(i));
        }
        for i in 0..8 {
            assert_eq!(queue.pop(), Some(i));
        }
    }

    #[test]
    fn close_drains_then_ends() {
        let queue = BoundedQueue::new(4);
        queue.push("a");
        queue.push("b");
        queue.close();
        assert!(!queue.push("c"), "push après close doit être refusé");
        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None, "None est collant");
    }

    #[test]
    fn close_releases_blocked_pop() {
        let queue = Arc::new(BoundedQueue::<u32>::new(4));
        let popper = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.pop())
        };
        std::thread::sleep(Duration::from_millis(50));
        queue.close();
        assert_eq!(popper.join().unwrap(), None);
    }

    #[test]
    fn producer_blocks_at_capacity_and_resumes() {
        let queue = Arc::new(BoundedQueue::new(8));
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut pushed = 0u32;
                for i in 0..100u32 {
                    if !queue.push(i) {
                        break;
                    }
                    pushed += 1;
                }
                pushed
            })
        };

        // Consumer stalled: the producer must stop at exactly capacity.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(queue.len(), 8, "le producteur doit bloquer après le 8e push");

        // Each pop unblocks one push, FIFO order preserved throughout.
        for expected in 0..100u32 {
            assert_eq!(queue.pop(), Some(expected));
        }
        assert_eq!(producer.join().unwrap(), 100);
        assert!(queue.is_empty());
    }

    #[test]
    fn close_releases_blocked_push() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(0u8);
        let pusher = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.push(1))
        };
        std::thread::sleep(Duration::from_millis(50));
        queue.close();
        assert!(!pusher.join().unwrap(), "un push bloqué est libéré en échec");
    }
}
