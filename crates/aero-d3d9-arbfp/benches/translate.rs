#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use aero_d3d9_arbfp::{disassemble, translate, TranslateOptions};
#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// ps_1_1 shader mixing texture addressing, modifiers and arithmetic, repeated `blocks` times.
#[cfg(not(target_arch = "wasm32"))]
fn ps_1_1_tokens(blocks: usize) -> Vec<u32> {
    let mut tokens = vec![0xFFFF_0101];
    // def c0, 0.5, 0.5, 0.5, 1.0
    tokens.extend([81, 0xA00F_0000, 0x3F00_0000, 0x3F00_0000, 0x3F00_0000, 0x3F80_0000]);
    // tex t0
    tokens.extend([66, 0xB00F_0000]);
    for _ in 0..blocks {
        // mad_sat r0, t0_bx2, v0, c0
        tokens.extend([4, 0x801F_0000, 0xB4E4_0000, 0x90E4_0000, 0xA0E4_0000]);
        // dp3 r1, r0_bias, c1.a
        tokens.extend([8, 0x800F_0001, 0x82E4_0000, 0xA0FF_0001]);
        // lrp r0.rgb, r1, r0, -v1
        tokens.extend([18, 0x8007_0000, 0x80E4_0001, 0x80E4_0000, 0x91E4_0001]);
    }
    tokens.push(0x0000_FFFF);
    tokens
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_ps_1_1(c: &mut Criterion) {
    let mut group = c.benchmark_group("ps_arbfp");
    for blocks in [1usize, 16, 128] {
        let tokens = ps_1_1_tokens(blocks);
        group.bench_with_input(BenchmarkId::new("translate", blocks), &tokens, |b, tokens| {
            b.iter(|| {
                let translation = translate(black_box(tokens), &TranslateOptions::default());
                black_box(translation.text.len());
            })
        });
        group.bench_with_input(BenchmarkId::new("disassemble", blocks), &tokens, |b, tokens| {
            b.iter(|| black_box(disassemble(black_box(tokens)).len()))
        });
    }
    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_ps_1_1);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
