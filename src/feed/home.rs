//! Fan-in barrier for the home screen's independent sections.
use std::collections::BTreeSet;
use std::fmt;

/// One independently loaded part of the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HomeSection {
    NewReleases,
    Trending,
    History,
    /// First page of the grid.
    Catalog,
}

impl HomeSection {
    pub const ALL: [HomeSection; 4] = [
        HomeSection::NewReleases,
        HomeSection::Trending,
        HomeSection::History,
        HomeSection::Catalog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HomeSection::NewReleases => "new_releases",
            HomeSection::Trending => "trending",
            HomeSection::History => "history",
            HomeSection::Catalog => "catalog",
        }
    }
}

impl fmt::Display for HomeSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts section completions for the current home load.
///
/// Each section counts once per load whether it succeeded or failed. The
/// placeholder is dismissed when all of [`HomeSection::ALL`] have reported.
#[derive(Debug, Clone, Default)]
pub struct HomeBarrier {
    generation: u64,
    completed: BTreeSet<HomeSection>,
    pending: bool,
}

impl HomeBarrier {
    /// Start a new load, returning its generation.
    pub fn start(&mut self) -> u64 {
        self.generation += 1;
        self.completed.clear();
        self.pending = true;
        self.generation
    }

    /// Record a completion. Returns `true` when this completion released the
    /// barrier.
    pub fn complete(&mut self, generation: u64, section: HomeSection) -> bool {
        if generation != self.generation || !self.pending {
            return false;
        }
        self.completed.insert(section);
        if self.completed.len() == HomeSection::ALL.len() {
            self.pending = false;
            return true;
        }
        false
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_complete(&self, section: HomeSection) -> bool {
        self.completed.contains(&section)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_after_all_four() {
        let mut barrier = HomeBarrier::default();
        let generation = barrier.start();

        assert!(!barrier.complete(generation, HomeSection::Trending));
        assert!(!barrier.complete(generation, HomeSection::History));
        assert!(!barrier.complete(generation, HomeSection::NewReleases));
        assert!(barrier.is_pending());
        assert!(barrier.complete(generation, HomeSection::Catalog));
        assert!(!barrier.is_pending());
        assert_eq!(barrier.completed_count(), 4);
    }

    #[test]
    fn test_duplicate_completion_counts_once() {
        let mut barrier = HomeBarrier::default();
        let generation = barrier.start();
        barrier.complete(generation, HomeSection::Trending);
        barrier.complete(generation, HomeSection::Trending);
        assert_eq!(barrier.completed_count(), 1);
    }

    #[test]
    fn test_previous_load_ignored() {
        let mut barrier = HomeBarrier::default();
        let old = barrier.start();
        barrier.complete(old, HomeSection::Trending);
        let current = barrier.start();

        assert!(!barrier.complete(old, HomeSection::History));
        assert_eq!(barrier.completed_count(), 0);
        assert!(!barrier.complete(current, HomeSection::History));
        assert_eq!(barrier.completed_count(), 1);
    }
}
