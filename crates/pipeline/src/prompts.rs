//! Prompt builders for every call the pipeline makes.

use std::fmt::Write as _;

use longform_core::chunk_plan::{ChunkAssignment, ContentPoint};
use longform_core::generation::GenerationRequest;
use longform_core::job::GenerationParams;

/// Spoken words per minute used to size chunks.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// Characters of the previous chunk repeated for continuity.
pub const CONTINUITY_TAIL_CHARS: usize = 400;

/// Temperature for the chunk distribution call.
pub const PLAN_TEMPERATURE: f32 = 0.2;

const OUTLINE_TEMPERATURE: f32 = 0.5;
const SCRIPT_TEMPERATURE: f32 = 0.7;

pub fn target_words(minutes: f64) -> u32 {
    (minutes.max(0.0) * WORDS_PER_MINUTE).round() as u32
}

/// The last `max_chars` characters of `text`, on a char boundary.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let byte_start = text
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[byte_start..]
}

// ---------------------------------------------------------------------------
// Chunk distribution
// ---------------------------------------------------------------------------

pub fn plan_request(points: &[ContentPoint], total_minutes: f64, chunk_count: u32) -> GenerationRequest {
    let system = "You divide the content of a long spoken script into sequential parts. \
                  Reply with a single JSON object and nothing else.";

    let mut user = format!(
        "Distribute the following {} content points across exactly {chunk_count} parts of a \
         {total_minutes:.0}-minute script.\n\nRules:\n\
         - Every content point must appear in exactly one part.\n\
         - Keep the original order where it reads naturally.\n\
         - Use the titles exactly as written.\n\
         - Do not invent new points.\n\n\
         Content points:\n",
        points.len()
    );
    for (i, point) in points.iter().enumerate() {
        let _ = write!(user, "{}. {}", i + 1, point.title);
        if let Some(minutes) = point.duration_minutes {
            let _ = write!(user, " (~{minutes:.1} min)");
        }
        if !point.description.is_empty() {
            let _ = write!(user, ": {}", point.description);
        }
        user.push('\n');
    }
    user.push_str(
        "\nRespond as: {\"chunks\": [{\"sections\": [\"<title>\", ...]}, ...]} \
         with one entry per part, in order.",
    );

    GenerationRequest::new(system, user)
        .with_temperature(PLAN_TEMPERATURE)
        .json()
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

pub fn outline_request(
    title: &str,
    topic: &str,
    total_minutes: u32,
    chunk_count: u32,
    required_points: &[ContentPoint],
    research_notes: &[String],
    feedback: Option<&str>,
) -> GenerationRequest {
    let system = "You plan long-form spoken scripts such as documentaries and lectures. \
                  Reply with a single JSON object and nothing else.";

    let mut user = format!(
        "Create an outline for a {total_minutes}-minute script titled \"{title}\".\n"
    );
    if !topic.is_empty() {
        let _ = writeln!(user, "Topic: {topic}");
    }
    let _ = writeln!(
        user,
        "The script will be written in {chunk_count} parts, so aim for at least {chunk_count} \
         top-level sections. Section minutes must add up to {total_minutes}."
    );

    if !required_points.is_empty() {
        user.push_str("\nThe outline must cover these points:\n");
        for point in required_points {
            let _ = writeln!(user, "- {}: {}", point.title, point.description);
        }
    }
    if !research_notes.is_empty() {
        user.push_str("\nAvailable research:\n");
        for note in research_notes {
            let _ = writeln!(user, "- {note}");
        }
    }
    if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
        let _ = write!(
            user,
            "\nA previous outline was sent back with this feedback. Address it:\n{feedback}\n"
        );
    }

    user.push_str(
        "\nRespond as: {\"title\": \"...\", \"sections\": [{\"title\": \"...\", \
         \"description\": \"...\", \"estimated_minutes\": 5.0, \"subsections\": \
         [{\"title\": \"...\", \"description\": \"...\"}]}]}",
    );

    GenerationRequest::new(system, user)
        .with_temperature(OUTLINE_TEMPERATURE)
        .json()
}

// ---------------------------------------------------------------------------
// Script chunks
// ---------------------------------------------------------------------------

/// Everything a single chunk prompt needs.
pub struct ChunkPrompt<'a> {
    pub params: &'a GenerationParams,
    pub chunk: &'a ChunkAssignment,
    pub total_chunks: usize,
    pub forbidden_titles: &'a [String],
    /// End of the previous chunk's text, empty for the first chunk.
    pub previous_tail: &'a str,
}

pub fn chunk_request(prompt: &ChunkPrompt<'_>) -> GenerationRequest {
    let ChunkPrompt {
        params,
        chunk,
        total_chunks,
        forbidden_titles,
        previous_tail,
    } = prompt;

    let minutes = chunk.time_range.minutes();
    let words = target_words(minutes);
    let position = if chunk.chunk_number == 1 {
        "This is the opening part: introduce the subject and hook the listener."
    } else if chunk.chunk_number as usize == *total_chunks {
        "This is the final part: bring the script to a satisfying close."
    } else {
        "This is a middle part: continue seamlessly without re-introducing the subject."
    };

    let mut system = String::from(
        "You write long-form narration scripts meant to be read aloud. \
         Write flowing prose only, with no headings, stage directions, or notes.",
    );
    if let Some(tone) = params.tone.as_deref().filter(|t| !t.is_empty()) {
        let _ = write!(system, " Tone: {tone}.");
    }
    for (key, value) in &params.extra {
        if let Some(text) = value.as_str() {
            let _ = write!(system, " {key}: {text}.");
        }
    }

    let mut user = format!(
        "Script: \"{}\"{}\nPart {} of {total_chunks}, covering minutes {:.1} to {:.1} \
         (about {words} words).\n{position}\n",
        params.title,
        if params.topic.is_empty() {
            String::new()
        } else {
            format!(" about {}", params.topic)
        },
        chunk.chunk_number,
        chunk.time_range.start_minute,
        chunk.time_range.end_minute,
    );

    if chunk.assigned_sections.is_empty() {
        user.push_str("\nCover the next stretch of the subject in a natural progression.\n");
    } else {
        user.push_str("\nCover these sections, in order:\n");
        for section in &chunk.assigned_sections {
            let _ = write!(user, "- {} (~{:.1} min)", section.title, section.estimated_minutes);
            if !section.description.is_empty() {
                let _ = write!(user, ": {}", section.description);
            }
            user.push('\n');
        }
    }

    if !forbidden_titles.is_empty() {
        user.push_str("\nDo NOT cover these sections; other parts handle them:\n");
        for title in forbidden_titles.iter() {
            let _ = writeln!(user, "- {title}");
        }
    }

    if !previous_tail.is_empty() {
        let _ = write!(
            user,
            "\nThe previous part ended with:\n\"\"\"\n{previous_tail}\n\"\"\"\nContinue directly from there.\n"
        );
    }

    GenerationRequest::new(system, user)
        .with_temperature(SCRIPT_TEMPERATURE)
        .with_max_tokens((words * 2).clamp(1024, 16_000))
}
