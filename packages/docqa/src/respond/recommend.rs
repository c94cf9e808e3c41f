//! Suggested questions shown as chips under the answer box.

/// Maximum suggestions offered at once.
pub const MAX_RECOMMENDATIONS: usize = 5;

const BASE_QUESTIONS: &[&str] = &[
    "What is this document about?",
    "Give me a summary of this document",
    "Show me the content of this document",
];

const DEFAULT_QUESTIONS: &[&str] = &[
    "What is this document about?",
    "Can you summarize the main points?",
    "What are the key findings?",
    "Are there any recommendations?",
];

/// A group of questions offered when any of its cue words appear.
struct Topic {
    cues: &'static [&'static str],
    questions: &'static [&'static str],
}

const DOCUMENT_TOPICS: &[Topic] = &[
    Topic {
        cues: &["sales", "revenue", "profit", "$"],
        questions: &[
            "Find financial information in the document",
            "What is the total revenue mentioned?",
        ],
    },
    Topic {
        cues: &["project", "timeline", "schedule", "plan"],
        questions: &[
            "What is the project timeline?",
            "Find information about project planning",
        ],
    },
    Topic {
        cues: &["recommend", "conclusion", "summary"],
        questions: &[
            "What are the key recommendations?",
            "Find the conclusions in the document",
        ],
    },
];

const FOLLOW_UP_TOPICS: &[Topic] = &[
    Topic {
        cues: &["financial", "revenue", "sales", "profit"],
        questions: &["Find all financial figures in the document"],
    },
    Topic {
        cues: &["project", "timeline"],
        questions: &["What are the project milestones?"],
    },
    Topic {
        cues: &["search", "found"],
        questions: &["Show me the complete document content"],
    },
];

fn collect(base: &[&str], topics: &[Topic], text: &str) -> Vec<String> {
    base.iter()
        .copied()
        .chain(
            topics
                .iter()
                .filter(|topic| topic.cues.iter().any(|cue| text.contains(cue)))
                .flat_map(|topic| topic.questions.iter().copied()),
        )
        .take(MAX_RECOMMENDATIONS)
        .map(String::from)
        .collect()
}

/// Questions for a freshly loaded document. Cue matching is case-sensitive.
pub fn initial_questions(document_text: &str) -> Vec<String> {
    collect(BASE_QUESTIONS, DOCUMENT_TOPICS, document_text)
}

/// Questions following up on the previous answer.
pub fn follow_up_questions(previous_answer: &str) -> Vec<String> {
    collect(
        &[
            "Show me more of the document content",
            "Find specific information in the document",
        ],
        FOLLOW_UP_TOPICS,
        previous_answer,
    )
}

/// Questions shown before any document is loaded.
pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().copied().map(String::from).collect()
}
