use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;

use custombet_terminal::config::{Locale, PredictionConfig, PredictionVariant};
use custombet_terminal::gemini::parse_generate_response;
use custombet_terminal::state::{AppState, Delta, apply_delta};

fn sample_response(count: usize) -> String {
    let matches: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "homeTeam": format!("Home {i}"),
                "awayTeam": format!("Away {i}"),
                "league": "Premier League",
                "market1": "Home win",
                "market2": "Over 1.5 goals",
                "confidence": 50 + i,
                "reasoning": "Home side unbeaten in five with a strong attack."
            })
        })
        .collect();
    let chunks: Vec<_> = (0..count)
        .map(|i| json!({ "web": { "uri": format!("https://example.com/{i}"), "title": "example.com" } }))
        .collect();
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": json!({ "matches": matches }).to_string() }] },
            "finishReason": "STOP",
            "groundingMetadata": { "groundingChunks": chunks }
        }]
    })
    .to_string()
}

fn bench_response_parse(c: &mut Criterion) {
    let raw = sample_response(13);
    c.bench_function("generate_response_parse", |b| {
        b.iter(|| {
            let batch = parse_generate_response(
                black_box(&raw),
                PredictionVariant::CustomBet,
                Locale::Pt,
            )
            .unwrap();
            black_box(batch.matches.len());
        })
    });
}

fn bench_apply_loaded(c: &mut Criterion) {
    let raw = sample_response(13);
    let batch = parse_generate_response(&raw, PredictionVariant::CustomBet, Locale::Pt).unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let config = PredictionConfig::default();
    c.bench_function("apply_predictions_loaded", |b| {
        b.iter(|| {
            let mut state = AppState::for_date(date, &config);
            let req = state.refresh().unwrap();
            apply_delta(
                &mut state,
                Delta::PredictionsLoaded {
                    generation: req.generation,
                    date: req.date,
                    batch: batch.clone(),
                },
            );
            black_box(state.matches.len());
        })
    });
}

criterion_group!(benches, bench_response_parse, bench_apply_loaded);
criterion_main!(benches);
