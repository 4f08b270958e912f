use reflect_box_lib::llm::{ChatBackend, ChatMode, ChatRequest, LlmError};
use reflect_box_lib::parser::{extract_biases, parse_model_output, BiasDescriptor};
use reflect_box_lib::session::biases::{analysis_set_index, BiasDecision};
use reflect_box_lib::session::ideas::IdeaProvenance;
use reflect_box_lib::session::{Role, Session, SessionError};
use reflect_box_lib::workflow::{run_stage, Stage, StageOutcome, Workbench};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

struct Replay {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Replay {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ChatBackend for Replay {
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        next.ok_or_else(|| LlmError::Shape("out of replies".to_string()))
    }
}

fn bias(id: &str, title: &str) -> BiasDescriptor {
    BiasDescriptor {
        id: id.to_string(),
        title: title.to_string(),
        explanation: "...".to_string(),
        challenging_ideas: vec!["Try X".to_string()],
    }
}

#[test]
fn biases_block_after_prose() {
    let raw = "Here's a thought.\n<biases>[{\"title\":\"Status quo bias\",\"explanation\":\"...\",\"challengingIdeas\":[\"Try X\",\"Try Y\"]}]</biases>";
    let parsed = parse_model_output(raw);
    let biases = extract_biases(&parsed.structured);

    assert_eq!(parsed.clean_text, "Here's a thought.");
    assert_eq!(biases.len(), 1);
    assert_eq!(biases[0].title, "Status quo bias");
    assert_eq!(biases[0].challenging_ideas, ["Try X", "Try Y"]);
}

#[test]
fn clean_text_parses_to_nothing_new() {
    let parsed = parse_model_output("Sounds hard.\n<summary>A hard week</summary>\n<ideas>- Rest</ideas>");
    let again = parse_model_output(&parsed.clean_text);
    assert!(again.structured.is_empty());
    assert_eq!(again.clean_text, parsed.clean_text);
}

#[test]
fn repeated_source_ids_never_collide() {
    let mut session = Session::new();
    let mut ids = HashSet::new();
    let mut total = 0;
    for round in 0..4 {
        let set = session
            .append_analysis(vec![bias("bias_1", "Anchoring"), bias("bias_2", "Halo effect")])
            .unwrap();
        total += set.len();
        for b in set {
            assert_eq!(analysis_set_index(&b.id), Some(round));
            ids.insert(b.id.clone());
        }
    }
    assert_eq!(ids.len(), total);
    assert!(ids.contains("analysis_0_bias_1"));
    assert!(ids.contains("analysis_1_bias_1"));
}

#[test]
fn toggle_twice_restores_active_list() {
    let mut session = Session::new();
    session.add_idea("Journal tonight");
    session.merge_suggested_ideas(&["Call a friend".to_string()]);
    let before = session.ideas().my_ideas().to_vec();

    assert!(session.toggle_challenging_idea("Question the evidence"));
    assert_eq!(
        session.ideas().provenance("Question the evidence"),
        IdeaProvenance::ChallengeDerived
    );
    assert!(!session.toggle_challenging_idea("Question the evidence"));
    assert_eq!(session.ideas().my_ideas(), before.as_slice());

    session.add_idea("Call a friend");
    session.remove_idea("Call a friend");
    assert!(session.ideas().suggested_ideas().contains(&"Call a friend".to_string()));
}

#[test]
fn whitespace_comment_means_no_comment() {
    let mut session = Session::new();
    session.add_idea("Sleep earlier");
    session.set_idea_comment("Sleep earlier", "good one");
    session.set_idea_comment("Sleep earlier", " \t ");
    assert!(!session.ideas().has_comment("Sleep earlier"));
}

#[test]
fn rejected_import_keeps_current_session() {
    let mut session = Session::new();
    session.set_experience("Job interview");
    for (role, text) in [
        (Role::Assistant, "How did it go?"),
        (Role::User, "Not great"),
        (Role::Assistant, "What stood out?"),
    ] {
        session.push_message(role, text);
    }
    let before = session.export();

    let json = r#"{"tab1History": [], "myIdeas": [], "allSuggestedIdeas": [],
        "tab3ChallengingIdeas": [], "biasDecisions": {}, "biasUserIdeas": {}}"#;
    assert!(matches!(session.import_json(json), Err(SessionError::InvalidSnapshot(_))));
    assert_eq!(session.transcript().len(), 3);
    assert_eq!(session.export(), before);
}

#[tokio::test]
async fn three_stages_end_to_end() {
    let bench = Mutex::new(Workbench::new());
    bench.lock().unwrap().session.set_experience("Gave a talk that fell flat");
    let backend = Replay::new(&[
        "What part felt flat?",
        "That sounds discouraging.",
        "<summary>A talk that did not land with the audience</summary>",
        "Some options:\n<ideas>[\"Ask for feedback\", \"Rehearse with a colleague\"]</ideas>",
        "<biases>[{\"title\":\"Spotlight effect\",\"explanation\":\"Others noticed less\",\"challengingIdeas\":[\"Ask two attendees\"]}]</biases>",
        "<biases>[{\"title\":\"Negativity bias\",\"explanation\":\"One slip dominates\",\"challengingIdeas\":[]}]</biases>",
    ]);

    run_stage(&bench, &backend, Stage::StartConversation).await.unwrap();
    run_stage(&bench, &backend, Stage::SendMessage("The Q&A".to_string()))
        .await
        .unwrap();
    let summarized = run_stage(&bench, &backend, Stage::Summarize).await.unwrap();
    assert!(matches!(summarized, StageOutcome::Summarized { fallback: false, .. }));

    let ideas = run_stage(&bench, &backend, Stage::GenerateIdeas).await.unwrap();
    assert_eq!(
        ideas,
        StageOutcome::IdeasSuggested {
            added: vec!["Ask for feedback".to_string(), "Rehearse with a colleague".to_string()]
        }
    );

    run_stage(&bench, &backend, Stage::ChallengeBiases).await.unwrap();
    {
        let mut guard = bench.lock().unwrap();
        let session = &mut guard.session;
        session.add_idea("Ask for feedback");
        session
            .set_bias_decision("analysis_0_bias_1", Some(BiasDecision::Accepted))
            .unwrap();
        session.toggle_challenging_idea("Ask two attendees");
    }
    run_stage(&bench, &backend, Stage::ChallengeBiases).await.unwrap();

    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests[2].force_summary, Some(true));
    assert_eq!(requests[3].mode, ChatMode::GenerateIdeas);
    let last = requests.last().unwrap();
    assert_eq!(last.previous_biases.as_ref().unwrap()[0].id, "analysis_0_bias_1");
    assert_eq!(
        last.my_ideas.as_deref(),
        Some(&["Ask for feedback".to_string(), "Ask two attendees".to_string()][..])
    );

    let guard = bench.lock().unwrap();
    let session = &guard.session;
    assert_eq!(session.transcript().len(), 3);
    assert_eq!(session.analyses().len(), 2);
    assert_eq!(session.active_biases().unwrap()[0].id, "analysis_1_bias_1");
    assert_eq!(
        session.annotations().decision("analysis_0_bias_1"),
        Some(BiasDecision::Accepted)
    );

    let mut restored = Session::new();
    restored.import_json(&session.export_json().unwrap()).unwrap();
    assert_eq!(restored.export(), session.export());
}
