//! Concurrency-safe ordered song list
//!
//! The orchestration loop owns advancement, but external callers mutate
//! the queue concurrently (enqueue, remove, clear), so every index access
//! is bounds-checked: the entry a loop iteration is about to read may
//! already be gone.

use jukebot_common::Song;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered, concurrency-safe song list (duplicates allowed)
#[derive(Clone, Default)]
pub struct SongQueue {
    songs: Arc<RwLock<Vec<Song>>>,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a song to the end of the queue
    pub async fn push(&self, song: Song) {
        self.songs.write().await.push(song);
    }

    /// Clone of the song at `index`, if it still exists
    pub async fn get(&self, index: usize) -> Option<Song> {
        self.songs.read().await.get(index).cloned()
    }

    /// Replace the song at `index`. Returns false when the index is gone.
    pub async fn update(&self, index: usize, song: Song) -> bool {
        let mut songs = self.songs.write().await;
        match songs.get_mut(index) {
            Some(slot) => {
                *slot = song;
                true
            }
            None => false,
        }
    }

    /// Remove and return the song at `index`; out-of-bounds indices leave
    /// the queue unchanged.
    pub async fn remove(&self, index: usize) -> Option<Song> {
        let mut songs = self.songs.write().await;
        if index < songs.len() {
            Some(songs.remove(index))
        } else {
            None
        }
    }

    /// Remove every queued song
    pub async fn clear(&self) {
        self.songs.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.songs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.songs.read().await.is_empty()
    }

    /// Copy of the current queue contents
    pub async fn snapshot(&self) -> Vec<Song> {
        self.songs.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(name: &str) -> Song {
        Song::direct(format!("https://example.com/{}.mp3", name))
    }

    #[tokio::test]
    async fn push_and_snapshot_preserve_order() {
        let queue = SongQueue::new();
        queue.push(song("a")).await;
        queue.push(song("b")).await;
        queue.push(song("c")).await;

        let names: Vec<String> = queue.snapshot().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3", "c.mp3"]);
    }

    #[tokio::test]
    async fn duplicates_are_allowed() {
        let queue = SongQueue::new();
        let s = song("same");
        queue.push(s.clone()).await;
        queue.push(s).await;
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn remove_out_of_bounds_leaves_queue_unchanged() {
        let queue = SongQueue::new();
        queue.push(song("only")).await;

        assert!(queue.remove(5).await.is_none());
        assert_eq!(queue.len().await, 1);

        let removed = queue.remove(0).await.unwrap();
        assert_eq!(removed.name, "only.mp3");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn update_misses_after_concurrent_clear() {
        let queue = SongQueue::new();
        queue.push(song("x")).await;
        queue.clear().await;
        assert!(!queue.update(0, song("y")).await);
        assert!(queue.get(0).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_access_is_safe() {
        let queue = SongQueue::new();
        for i in 0..50 {
            queue.push(song(&format!("s{}", i))).await;
        }

        let reader = queue.clone();
        let read_task = tokio::spawn(async move {
            // iterate by index while another task clears underneath us
            for i in 0..50 {
                let _ = reader.get(i).await;
                tokio::task::yield_now().await;
            }
        });
        let clearer = queue.clone();
        let clear_task = tokio::spawn(async move {
            clearer.clear().await;
        });

        read_task.await.unwrap();
        clear_task.await.unwrap();
        assert!(queue.is_empty().await);
    }
}
