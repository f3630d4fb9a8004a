use rand::Rng;

/// Shuffle `items` in place with the thread-local generator.
pub fn shuffle<T>(items: &mut [T]) {
    shuffle_with(items, &mut rand::thread_rng());
}

/// Fisher-Yates shuffle of `items` driven by `rng`.
pub fn shuffle_with<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
