use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde_json::{Value, json};

use crate::config::{Locale, PredictionVariant};
use crate::state::DATE_FORMAT;

static CUSTOMBET_SCHEMA: Lazy<Value> = Lazy::new(|| {
    response_schema_with(
        json!({
            "id": { "type": "STRING" },
            "homeTeam": { "type": "STRING" },
            "awayTeam": { "type": "STRING" },
            "league": { "type": "STRING" },
            "market1": { "type": "STRING" },
            "market2": { "type": "STRING" },
            "confidence": { "type": "NUMBER" },
            "reasoning": { "type": "STRING" }
        }),
        &[
            "homeTeam",
            "awayTeam",
            "league",
            "market1",
            "market2",
            "confidence",
            "reasoning",
        ],
    )
});

static OUTCOME_SCHEMA: Lazy<Value> = Lazy::new(|| {
    response_schema_with(
        json!({
            "id": { "type": "STRING" },
            "homeTeam": { "type": "STRING" },
            "awayTeam": { "type": "STRING" },
            "league": { "type": "STRING" },
            "prediction": { "type": "STRING", "enum": ["1", "X", "2"] },
            "startTime": { "type": "STRING" },
            "confidence": { "type": "NUMBER" },
            "reasoning": { "type": "STRING" }
        }),
        &[
            "homeTeam",
            "awayTeam",
            "league",
            "prediction",
            "startTime",
            "confidence",
            "reasoning",
        ],
    )
});

fn response_schema_with(item_properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "matches": {
                "type": "ARRAY",
                "description": "Analysed matches in display order",
                "items": {
                    "type": "OBJECT",
                    "properties": item_properties,
                    "required": required
                }
            },
            "summary": {
                "type": "STRING",
                "description": "Short summary of the round"
            }
        },
        "required": ["matches"]
    })
}

/// Output schema declared to the provider for `variant`.
pub fn response_schema(variant: PredictionVariant) -> &'static Value {
    match variant {
        PredictionVariant::CustomBet => &CUSTOMBET_SCHEMA,
        PredictionVariant::Outcome => &OUTCOME_SCHEMA,
    }
}

pub fn build_prompt(
    date: NaiveDate,
    variant: PredictionVariant,
    match_count: usize,
    locale: Locale,
) -> String {
    let date = date.format(DATE_FORMAT);
    let language = match locale {
        Locale::Pt => "Brazilian Portuguese",
        Locale::En => "English",
    };
    let pick_rules = match variant {
        PredictionVariant::CustomBet => format!(
            "3. For each match build a CUSTOMBET: a logical combination of two betting markets.\n\
             4. Market example: \"Team A to win + Over 1.5 goals in the match\".\n\n\
             RESPONSE FORMAT:\n\
             Return EXACTLY one JSON object with a 'matches' array of {match_count} objects.\n\
             Each object must have: homeTeam, awayTeam, league, market1, market2, \
             confidence (0-100) and reasoning (one short sentence justifying the pick)."
        ),
        PredictionVariant::Outcome => format!(
            "3. For each match predict the full-time result as \"1\" (home win), \"X\" (draw) \
             or \"2\" (away win).\n\
             4. Include the kickoff time in the match's local time zone.\n\n\
             RESPONSE FORMAT:\n\
             Return EXACTLY one JSON object with a 'matches' array of {match_count} objects.\n\
             Each object must have: homeTeam, awayTeam, league, prediction, startTime, \
             confidence (0-100) and reasoning (one short sentence justifying the pick)."
        ),
    };

    format!(
        "You are an elite football (soccer) statistical analyst.\n\
         Target date: {date}.\n\n\
         MISSION:\n\
         1. Use the Google Search tool to find {match_count} real football matches played on {date}.\n\
         2. If there are not {match_count} major matches on that exact date, search the following \
         24 hours or secondary professional leagues.\n\
         {pick_rules}\n\
         Write the reasoning in {language}.\n\n\
         IMPORTANT: If you cannot find enough data, use the closest available upcoming matches \
         to fill all {match_count} slots. NEVER return fewer than {match_count} matches."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn prompt_fixes_date_and_count() {
        let prompt = build_prompt(date(), PredictionVariant::CustomBet, 13, Locale::Pt);
        assert!(prompt.contains("Target date: 2026-10-19."));
        assert!(prompt.contains("13 real football matches"));
        assert!(prompt.contains("NEVER return fewer than 13"));
        assert!(prompt.contains("market1, market2"));
        assert!(prompt.contains("Brazilian Portuguese"));
    }

    #[test]
    fn outcome_prompt_asks_for_result_codes() {
        let prompt = build_prompt(date(), PredictionVariant::Outcome, 13, Locale::En);
        assert!(prompt.contains("\"X\" (draw)"));
        assert!(prompt.contains("startTime"));
        assert!(!prompt.contains("market1"));
    }

    #[test]
    fn schema_requires_variant_fields() {
        let schema = response_schema(PredictionVariant::CustomBet);
        assert_eq!(schema["required"], json!(["matches"]));
        let required = schema["properties"]["matches"]["items"]["required"]
            .as_array()
            .expect("required list");
        assert!(required.contains(&json!("market2")));
        assert!(!required.contains(&json!("id")));

        let schema = response_schema(PredictionVariant::Outcome);
        let required = schema["properties"]["matches"]["items"]["required"]
            .as_array()
            .expect("required list");
        assert!(required.contains(&json!("prediction")));
        assert!(!required.contains(&json!("market1")));
    }
}
