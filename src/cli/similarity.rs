use anyhow::Result;
use clap::Args;
use heal_locator::similarity::measures;
use serde_json::json;

use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct TextSimArgs {
    pub a: String,
    pub b: String,
}

pub fn cmd_text_sim(args: TextSimArgs, output: OutputFormat) -> Result<()> {
    let scores = measures(&args.a, &args.b);
    let best = scores.best();
    let report = json!({
        "levenshtein": scores.levenshtein,
        "fuzzy": scores.fuzzy,
        "jaccard": scores.jaccard,
        "lcs": scores.lcs,
        "similarity": best,
    });
    output.print(&report, || {
        format!(
            "levenshtein {:.3}\nfuzzy       {:.3}\njaccard     {:.3}\nlcs         {:.3}\nsimilarity  {:.3}",
            scores.levenshtein, scores.fuzzy, scores.jaccard, scores.lcs, best
        )
    })
}
