use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rich_editor_core::collaborators::test_support::TestLayoutProvider;
use rich_editor_core::{Editor, EditorParams, LayoutParams};

fn large_text(paragraph_count: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(paragraph_count * 64);
    for i in 0..paragraph_count {
        out.extend(format!("{i:06} the quick brown fox jumps over the lazy dog\n").chars().map(|c| c as u32));
    }
    out.pop(); // no trailing empty paragraph
    out
}

fn layout_params() -> LayoutParams {
    LayoutParams { width: 800.0, tab_width: 32.0, line_height_multiplier: 1.0 }
}

fn bench_large_document_load(c: &mut Criterion) {
    let cps = large_text(50_000);
    c.bench_function("large_document_load/50k_paragraphs", |b| {
        b.iter(|| {
            let mut editor = Editor::new(EditorParams::default());
            editor.paste_utf32(black_box(&cps));
            black_box(editor.rich_text().paragraphs.len());
        })
    });
}

fn bench_typing_in_middle(c: &mut Criterion) {
    let cps = large_text(50_000);
    c.bench_function("typing_middle/100_inserts", |b| {
        b.iter_batched(
            || {
                let mut editor = Editor::new(EditorParams::default());
                editor.paste_utf32(&cps);
                editor
            },
            |mut editor| {
                for _ in 0..100 {
                    editor.insert_codepoints(&['x' as u32], true);
                }
                black_box(editor.rich_text().total_len());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_relayout_after_single_paragraph_edit(c: &mut Criterion) {
    let cps = large_text(50_000);
    let provider = TestLayoutProvider::new();
    let params = layout_params();
    let mut editor = Editor::new(EditorParams::default());
    editor.paste_utf32(&cps);
    editor.relayout(&params, &provider);

    c.bench_function("relayout/after_one_paragraph_edit", |b| {
        b.iter(|| {
            editor.insert_codepoints(&['x' as u32], true);
            editor.relayout(&params, &provider);
            black_box(editor.layout().total_bounds);
        })
    });
}

fn bench_undo_redo_throughput(c: &mut Criterion) {
    c.bench_function("undo_redo/1000_roundtrips", |b| {
        b.iter_batched(
            || {
                let mut editor = Editor::new(EditorParams::default());
                for i in 0..1000u32 {
                    editor.insert_codepoints(&[b'a' as u32 + (i % 26)], false);
                }
                editor
            },
            |mut editor| {
                while editor.can_undo() {
                    editor.undo();
                }
                while editor.can_redo() {
                    editor.redo();
                }
                black_box(editor.rich_text().total_len());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_large_document_load,
    bench_typing_in_middle,
    bench_relayout_after_single_paragraph_edit,
    bench_undo_redo_throughput
);
criterion_main!(benches);
