/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

const OPUS_4_5: Pricing = Pricing {
    input: 5.0,
    output: 25.0,
    cache_write: 6.25,
    cache_read: 0.50,
};

const OPUS: Pricing = Pricing {
    input: 15.0,
    output: 75.0,
    cache_write: 18.75,
    cache_read: 1.50,
};

const SONNET: Pricing = Pricing {
    input: 3.0,
    output: 15.0,
    cache_write: 3.75,
    cache_read: 0.30,
};

const HAIKU_4_5: Pricing = Pricing {
    input: 1.0,
    output: 5.0,
    cache_write: 1.25,
    cache_read: 0.10,
};

const HAIKU_3_5: Pricing = Pricing {
    input: 0.80,
    output: 4.0,
    cache_write: 1.0,
    cache_read: 0.08,
};

const HAIKU_3: Pricing = Pricing {
    input: 0.25,
    output: 1.25,
    cache_write: 0.30,
    cache_read: 0.03,
};

/// Look up pricing by model id, e.g. `claude-sonnet-4-20250514`.
/// Unknown models return `None` and are costed at zero.
pub fn for_model(model: &str) -> Option<Pricing> {
    let m = model.to_lowercase();

    if m.contains("opus") {
        if ["opus-4-5", "opus-4-6", "opus-4.5", "opus-4.6"]
            .iter()
            .any(|v| m.contains(v))
        {
            return Some(OPUS_4_5);
        }
        return Some(OPUS);
    }
    if m.contains("sonnet") {
        return Some(SONNET);
    }
    if m.contains("haiku") {
        if m.contains("haiku-4") || m.contains("4-5-haiku") {
            return Some(HAIKU_4_5);
        }
        if m.contains("3-5-haiku") || m.contains("haiku-3-5") {
            return Some(HAIKU_3_5);
        }
        return Some(HAIKU_3);
    }
    None
}

/// Cost in USD for one usage record.
pub fn cost_for(
    model: &str,
    input: u64,
    output: u64,
    cache_creation: u64,
    cache_read: u64,
) -> f64 {
    let Some(p) = for_model(model) else {
        tracing::debug!(model, "no pricing for model, costing at zero");
        return 0.0;
    };

    let per_million = |tokens: u64, rate: f64| tokens as f64 * rate / 1_000_000.0;

    per_million(input, p.input)
        + per_million(output, p.output)
        + per_million(cache_creation, p.cache_write)
        + per_million(cache_read, p.cache_read)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_families() {
        assert_eq!(for_model("claude-opus-4-6"), Some(OPUS_4_5));
        assert_eq!(for_model("claude-opus-4-1-20250805"), Some(OPUS));
        assert_eq!(for_model("claude-sonnet-4-20250514"), Some(SONNET));
        assert_eq!(for_model("claude-haiku-4-5-20251001"), Some(HAIKU_4_5));
        assert_eq!(for_model("claude-3-5-haiku-20241022"), Some(HAIKU_3_5));
        assert_eq!(for_model("gpt-4o"), None);
    }

    #[test]
    fn test_cost_for() {
        let cost = cost_for("claude-sonnet-4", 1_000_000, 1_000_000, 0, 0);
        assert!((cost - 18.0).abs() < 1e-9);

        let cached = cost_for("claude-sonnet-4", 0, 0, 1_000_000, 1_000_000);
        assert!((cached - 4.05).abs() < 1e-9);

        assert_eq!(cost_for("mystery-model", 1000, 1000, 0, 0), 0.0);
    }
}
