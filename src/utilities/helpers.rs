use crate::utilities::enums::Kernel;
use rayon::prelude::*;
use std::sync::OnceLock;
use tracing::{debug, trace};

static BEST_SINGLE : OnceLock<Kernel> = OnceLock::new();
static BEST_BATCH  : OnceLock<Kernel> = OnceLock::new();

/// Smallest number of outputs worth handing to a separate task when the
/// chunk count is picked automatically.
pub const MIN_CHUNK_LEN: usize = 1 << 14;

#[inline(always)]
pub fn detect_best_kernel() -> Kernel {
    *BEST_SINGLE.get_or_init(|| {
        if rayon::current_num_threads() > 1 {
            Kernel::Parallel
        } else {
            Kernel::Serial
        }
    })
}

#[inline(always)]
pub fn detect_best_batch_kernel() -> Kernel {
    *BEST_BATCH.get_or_init(|| match detect_best_kernel() {
        Kernel::Parallel => Kernel::ParallelBatch,
        _                => Kernel::SerialBatch,
    })
}

#[inline(always)]
pub fn resolve_kernel(kernel: Kernel) -> Kernel {
    match kernel {
        Kernel::Auto => detect_best_kernel(),
        other        => other,
    }
}

/// Contiguous split of `[0, len)` into `chunks` ranges of `chunk_len`
/// outputs (the last one may be shorter).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChunkPlan {
    pub len: usize,
    pub chunk_len: usize,
    pub chunks: usize,
}

impl ChunkPlan {
    pub fn with_chunks(len: usize, chunks: usize) -> Self {
        if len == 0 {
            return Self { len, chunk_len: 0, chunks: 0 };
        }
        let wanted = chunks.clamp(1, len);
        let chunk_len = (len + wanted - 1) / wanted;
        let chunks = (len + chunk_len - 1) / chunk_len;
        Self { len, chunk_len, chunks }
    }

    /// Output range of chunk `k`.
    #[inline]
    pub fn bounds(&self, k: usize) -> (usize, usize) {
        let lo = k * self.chunk_len;
        (lo, (lo + self.chunk_len).min(self.len))
    }
}

/// First input index a chunk starting at output `lo` needs to rebuild its
/// window state.
#[inline(always)]
pub fn context_start(lo: usize, window: usize) -> usize {
    lo.saturating_sub(window.saturating_sub(1))
}

/// Picks the chunk layout for one call.
///
/// An explicit `jobs` is honoured as is (clamped to `len`). Otherwise serial
/// kernels get one chunk and parallel kernels get one chunk per pool thread,
/// as long as every chunk keeps at least `max(MIN_CHUNK_LEN, window)` outputs
/// so the per-chunk warm-up stays small next to the payload.
pub fn plan_chunks(len: usize, window: usize, kernel: Kernel, jobs: Option<usize>) -> ChunkPlan {
    let chunks = match jobs {
        Some(j) => j,
        None if resolve_kernel(kernel).is_parallel() => {
            let floor = MIN_CHUNK_LEN.max(window);
            rayon::current_num_threads().min(len / floor).max(1)
        }
        None => 1,
    };
    ChunkPlan::with_chunks(len, chunks)
}

/// Runs `f` once per chunk of `out`.
///
/// `f(context, skip, out_chunk)` receives the input slice starting
/// `window - 1` positions before the chunk (or at 0), the number of leading
/// context positions that only warm up state, and the chunk's output slice.
/// Chunks run on the rayon pool when `kernel` resolves to a parallel one and
/// in order on the calling thread otherwise. No state crosses chunks, so both
/// schedules write identical output.
pub fn run_chunked<T, F>(data: &[T], window: usize, kernel: Kernel, jobs: Option<usize>, out: &mut [f64], f: F)
where
    T: Sync,
    F: Fn(&[T], usize, &mut [f64]) + Sync,
{
    debug_assert_eq!(data.len(), out.len());
    let plan = plan_chunks(data.len(), window, kernel, jobs);
    if plan.chunks == 0 {
        return;
    }
    let parallel = resolve_kernel(kernel).is_parallel() && plan.chunks > 1;
    debug!(
        len = plan.len,
        window,
        chunks = plan.chunks,
        chunk_len = plan.chunk_len,
        parallel,
        "scheduling rolling window chunks"
    );

    let do_chunk = |k: usize, out_chunk: &mut [f64]| {
        let (lo, hi) = plan.bounds(k);
        let ctx = context_start(lo, window);
        trace!(chunk = k, lo, hi, ctx, "running chunk");
        f(&data[ctx..hi], lo - ctx, out_chunk);
    };

    if parallel {
        out.par_chunks_mut(plan.chunk_len)
            .enumerate()
            .for_each(|(k, slice)| do_chunk(k, slice));
    } else {
        for (k, slice) in out.chunks_mut(plan.chunk_len).enumerate() {
            do_chunk(k, slice);
        }
    }
}

/// Checks that every `Ready` position of `out` has been written. Kernels fill
/// the warm-up prefix themselves, so a stray sentinel means a missed slot.
#[cfg(test)]
pub fn assert_no_poison(out: &[f64], poison: f64) {
    for (i, &v) in out.iter().enumerate() {
        assert!(
            v.to_bits() != poison.to_bits(),
            "output slot {i} was never written"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_plan_covers_range() {
        let plan = ChunkPlan::with_chunks(10, 3);
        assert_eq!(plan.chunk_len, 4);
        assert_eq!(plan.chunks, 3);
        assert_eq!(plan.bounds(0), (0, 4));
        assert_eq!(plan.bounds(2), (8, 10));

        let plan = ChunkPlan::with_chunks(5, 16);
        assert_eq!(plan.chunks, 5);
        assert_eq!(plan.chunk_len, 1);

        let plan = ChunkPlan::with_chunks(0, 4);
        assert_eq!(plan.chunks, 0);
    }

    #[test]
    fn test_plan_respects_kernel_and_jobs() {
        assert_eq!(plan_chunks(1 << 20, 8, Kernel::Serial, None).chunks, 1);
        assert_eq!(plan_chunks(100, 8, Kernel::Parallel, None).chunks, 1);
        assert_eq!(plan_chunks(100, 8, Kernel::Serial, Some(4)).chunks, 4);
        let par = plan_chunks(1 << 20, 8, Kernel::Parallel, None);
        assert!(par.chunks >= 1 && par.chunks <= rayon::current_num_threads());
        assert!(par.chunks == 1 || par.chunk_len >= MIN_CHUNK_LEN);
    }

    #[test]
    fn test_context_start() {
        assert_eq!(context_start(0, 5), 0);
        assert_eq!(context_start(3, 5), 0);
        assert_eq!(context_start(10, 5), 6);
        assert_eq!(context_start(10, 1), 10);
    }

    #[test]
    fn test_run_chunked_hands_out_context() {
        let data: Vec<usize> = (0..20).collect();
        for kernel in [Kernel::Serial, Kernel::Parallel] {
            let mut out = vec![f64::NAN; data.len()];
            run_chunked(&data, 4, kernel, Some(3), &mut out, |ctx, skip, chunk| {
                assert!(skip <= 3);
                assert_eq!(ctx.len(), skip + chunk.len());
                for (j, slot) in chunk.iter_mut().enumerate() {
                    *slot = ctx[skip + j] as f64;
                }
            });
            assert_no_poison(&out, f64::NAN);
            for (i, &v) in out.iter().enumerate() {
                assert_eq!(v, i as f64);
            }
        }
    }
}
