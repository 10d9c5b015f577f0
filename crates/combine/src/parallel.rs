#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

#[cfg(not(target_arch = "wasm32"))]
const PARALLEL_THRESHOLD: usize = 1024;

/// Runs `f` on every element, fanning out across threads once `work`
/// (an estimate of the total amount of inner work) crosses the threshold.
pub fn for_each_indexed_mut<T, F>(slice: &mut [T], work: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(not(target_arch = "wasm32"))]
    {
        if slice.len() > 1 && work >= PARALLEL_THRESHOLD {
            slice
                .par_iter_mut()
                .enumerate()
                .for_each(|(idx, value)| f(idx, value));
            return;
        }
    }
    #[cfg(target_arch = "wasm32")]
    let _ = work;

    for (idx, value) in slice.iter_mut().enumerate() {
        f(idx, value);
    }
}

/// Pairs `dst[i]` with `src[i]`. Both slices must have the same length.
pub fn zip_for_each_mut<T, U, F>(dst: &mut [T], src: &[U], f: F)
where
    T: Send,
    U: Sync,
    F: Fn(&mut T, &U) + Sync + Send,
{
    debug_assert_eq!(dst.len(), src.len());

    #[cfg(not(target_arch = "wasm32"))]
    {
        if dst.len() >= PARALLEL_THRESHOLD {
            dst.par_iter_mut()
                .zip(src.par_iter())
                .for_each(|(out, other)| f(out, other));
            return;
        }
    }

    for (out, other) in dst.iter_mut().zip(src) {
        f(out, other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_visits_every_element_once() {
        for len in [0usize, 3, 4096] {
            let mut values = vec![0usize; len];
            for_each_indexed_mut(&mut values, len, |idx, value| *value += idx + 1);
            assert!(values.iter().enumerate().all(|(idx, value)| *value == idx + 1));
        }
    }

    #[test]
    fn zip_pairs_matching_indices() {
        for len in [0usize, 5, 2048] {
            let src: Vec<f32> = (0..len).map(|i| i as f32).collect();
            let mut dst = vec![1.0f32; len];
            zip_for_each_mut(&mut dst, &src, |out, other| *out += *other);
            assert!(dst
                .iter()
                .enumerate()
                .all(|(idx, value)| *value == idx as f32 + 1.0));
        }
    }
}
