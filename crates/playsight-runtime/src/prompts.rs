//! Prompts sent to scoring backends.
//!
//! The system prompt is shared by every request and fixes the line-oriented
//! answer format [`TextResponseParser`](crate::normalize::TextResponseParser)
//! reads. The analysis prompt carries the play itself plus per-type
//! instructions.

use std::fmt::Write;

use playsight_core::{AnalysisContext, AnalysisType, GameSituation, Play};

use crate::normalize::JUDGMENT_LABELS;

/// System prompt shared by all analysis types.
pub const SYSTEM_PROMPT: &str = r#"
You are a tactical analyst reviewing a set play on a 100 x 100 pitch.
x runs from the team's own goal (0) to the opponent's goal (100); y runs
across the pitch from one touchline (0) to the other (100).

Score the play honestly. Do not invent players or movements that are not
listed. When the data is thin, say so in the risks rather than guessing.

## Answer format
Answer in plain lines exactly like this, one field per line:

Overall: N/100
Spacing: N/100
Timing: N/100
Formation: N/100
Effectiveness: N/100
Tactical: N/100
Spacing adequate: yes|no
Timing optimal: yes|no
Formation valid: yes|no
Objectives achievable: yes|no

Recommendations:
- one concrete change per line, naming the category it improves
  (spacing, timing, formation, positioning, tactical)

Risks:
- one weakness an opponent could exploit per line; start with
  "major", "moderate" or "minor"

Keep each list to at most three items per category.
"#;

/// Per-type instructions appended to the analysis prompt.
pub fn instructions(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::Quick => {
            "Give a quick read. Only list recommendations for problems that would \
             visibly hurt the play."
        }
        AnalysisType::Detailed => {
            "Give a detailed review. Cover every category, including minor \
             spacing and timing details."
        }
        AnalysisType::Comparative => {
            "Compare the play against a textbook version of its formation and \
             say where it deviates most."
        }
        AnalysisType::OpponentPerspective => {
            "Analyze the play as the opposing coach would. Focus the risks on \
             how each weakness can be exploited."
        }
        AnalysisType::Learning => {
            "Explain the play for a coach who is still learning. Start the \
             recommendations with the single most important lesson."
        }
    }
}

/// Render the user-facing analysis prompt for one play.
pub fn build_analysis_prompt(
    play: &Play,
    analysis_type: AnalysisType,
    context: Option<&AnalysisContext>,
) -> String {
    let mut prompt = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(prompt, "## Play: {}", play.name);
    let _ = writeln!(prompt, "Analysis type: {}", analysis_type);
    let _ = writeln!(
        prompt,
        "Formation: {}",
        play.formation.as_deref().unwrap_or("not declared")
    );

    let _ = writeln!(prompt, "\n### Players");
    for player in &play.players {
        let _ = write!(
            prompt,
            "- {} at ({:.1}, {:.1})",
            player.id, player.position.x, player.position.y
        );
        if let Some(role) = &player.role {
            let _ = write!(prompt, ", {}", role);
        }
        prompt.push('\n');
    }

    let _ = writeln!(prompt, "\n### Movements");
    let movements = play.ordered_movements();
    if movements.is_empty() {
        let _ = writeln!(prompt, "- none");
    }
    for movement in movements {
        let _ = writeln!(
            prompt,
            "- t={:.1}s {} runs to ({:.1}, {:.1}) over {:.1}s",
            movement.start_secs,
            movement.player_id,
            movement.to.x,
            movement.to.y,
            movement.duration_secs
        );
    }

    if !play.objectives.is_empty() {
        let _ = writeln!(prompt, "\n### Objectives");
        for objective in &play.objectives {
            let _ = writeln!(prompt, "- {}", objective);
        }
    }

    if let Some(context) = context.filter(|c| !c.is_empty()) {
        let _ = writeln!(prompt, "\n### Match context");
        if let Some(situation) = context.game_situation {
            let situation = match situation {
                GameSituation::Leading => "leading",
                GameSituation::Trailing => "trailing",
                GameSituation::Level => "level",
            };
            let _ = writeln!(prompt, "- Game situation: {}", situation);
        }
        if let Some(formation) = &context.opponent_formation {
            let _ = writeln!(prompt, "- Opponent formation: {}", formation);
        }
        if let Some(level) = &context.skill_level {
            let _ = writeln!(prompt, "- Skill level: {}", level);
        }
        if !context.focus_areas.is_empty() {
            let _ = writeln!(prompt, "- Focus on: {}", context.focus_areas.join(", "));
        }
    }

    let _ = writeln!(prompt, "\n### Instructions\n{}", instructions(analysis_type));
    let _ = writeln!(
        prompt,
        "Answer every score line and these judgments: {}.",
        JUDGMENT_LABELS.join(", ")
    );

    prompt
}
