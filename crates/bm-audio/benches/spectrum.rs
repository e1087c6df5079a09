use bm_audio::segment::windows;
use bm_audio::spectrum::{MagnitudeSpectrum, magnitude_spectra};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array1;

fn signal(len: usize) -> Vec<f32> {
    (0..len).map(|i| ((i as f32) * 0.031).sin() * 0.8).collect()
}

fn bench_single_window(c: &mut Criterion) {
    let mut fft = MagnitudeSpectrum::new(512);
    let window = Array1::from(signal(512));
    c.bench_function("magnitude_512", |b| {
        b.iter(|| fft.process(black_box(window.view())));
    });
}

fn bench_recording(c: &mut Criterion) {
    // ~1 s of stereo audio at 44.1 kHz, channel-concatenated.
    let segments = windows(&signal(88_200), 512, 128);
    c.bench_function("spectra_1s_stereo", |b| {
        b.iter(|| magnitude_spectra(black_box(&segments)));
    });
}

criterion_group!(benches, bench_single_window, bench_recording);
criterion_main!(benches);
