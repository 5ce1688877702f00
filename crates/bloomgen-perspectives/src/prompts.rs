// ABOUTME: Builds the system instruction and user message sent to the language model
// ABOUTME: Embeds the whole schema and every example perspective; output is deterministic

use bloomgen_ai::Message;
use bloomgen_core::{BloomError, ExampleCorpus, GenerationSettings, Result, SchemaSnapshot};

/// Fields Bloom refuses to import without, phrased as hard rules for the model
const REQUIRED_FIELD_RULES: &str = "\
1. The root object MUST contain a \"labels\" dictionary describing EVERY label used anywhere in the perspective, \
including every relationship start and end label. Format: \"LabelName\": [ {\"propertyKey\": \"prop\", \"type\": \"LabelName\", \"dataType\": \"string\"} ].\n\
2. Every entry of \"relationshipTypes\" MUST have a numeric, non-zero \"size\" (use 1).\n\
3. Every entry of \"categories\" MUST have an \"icon\" (use \"no-icon\" when unsure).\n\
4. Every entry of \"templates\" MUST have \"text\" (the search phrase) and \"cypher\" (the query).\n\
5. The root object MUST contain \"metadata\" with \"pathSegments\" (array) and \"indexes\" (array).\n\
6. The root object MUST contain \"sceneActions\" (array), \"hiddenRelationshipTypes\" (array), \
\"maxLimitToastMsgEnabled\" (boolean) and \"parentPerspectiveId\" (null).";

const PERSPECTIVE_RULES: &str = "\
1. Colors: assign distinct hex colors to categories.\n\
2. Captions: caption each category with its most descriptive property (name, title, id).\n\
3. Naming: perspective names are short, business friendly and unique.\n\
4. Data types: map Neo4j types to Bloom types: 'String' -> 'string', 'Integer'/'Long' -> 'bigint', \
'Float'/'Double' -> 'number', 'Boolean' -> 'boolean'.\n\
5. Only use labels, properties and relationship types that appear in the schema.";

const PERSPECTIVE_IDEAS: &str = "\
- Executive Overview: high level aggregates\n\
- Operational View: day to day transaction or process flows\n\
- Risk / Audit View: outliers, errors or fraud\n\
- Customer 360: centered on the customer entity\n\
- Product / Asset View: centered on products or inventory";

/// How many perspectives and search phrases to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPolicy {
    pub min_perspectives: usize,
    pub max_perspectives: usize,
    pub min_search_phrases: usize,
    pub max_search_phrases: usize,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            min_perspectives: 4,
            max_perspectives: 5,
            min_search_phrases: 3,
            max_search_phrases: 5,
        }
    }
}

impl PromptPolicy {
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        Self {
            min_perspectives: settings.min_perspectives,
            max_perspectives: settings.max_perspectives,
            ..Default::default()
        }
    }

    /// Ask for exactly `count` perspectives
    pub fn exactly(mut self, count: usize) -> Self {
        self.min_perspectives = count;
        self.max_perspectives = count;
        self
    }

    fn perspective_range(&self) -> String {
        if self.min_perspectives == self.max_perspectives {
            self.min_perspectives.to_string()
        } else {
            format!("{}-{}", self.min_perspectives, self.max_perspectives)
        }
    }
}

/// A system instruction plus one user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
}

impl PromptPayload {
    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

fn system_prompt(policy: &PromptPolicy, output_format: &str) -> String {
    format!(
        "You are an expert Neo4j Bloom Perspective Generator.\n\
         You receive a graph schema (labels with their properties, relationship types and the \
         label patterns they connect) together with example Bloom perspective files, and you \
         produce new perspectives in exactly the same JSON format as the examples.\n\n\
         ### OUTPUT FORMAT\n{output_format}\n\
         Return raw JSON only: no markdown fences, no commentary.\n\n\
         ### REQUIRED FIELDS (HARD CONSTRAINTS)\n{REQUIRED_FIELD_RULES}\n\n\
         ### PERSPECTIVE RULES\n{PERSPECTIVE_RULES}\n\
         6. Search phrases: generate {}-{} useful templates per perspective.\n\n\
         ### PERSPECTIVE IDEAS\n{PERSPECTIVE_IDEAS}\n",
        policy.min_search_phrases, policy.max_search_phrases
    )
}

fn context_block(schema: &SchemaSnapshot, corpus: &ExampleCorpus) -> Result<String> {
    if corpus.is_empty() {
        return Err(BloomError::Config(
            "the example corpus is empty; at least one example perspective is required".to_string(),
        ));
    }

    let schema_json = serde_json::to_string_pretty(schema)?;
    let mut block = format!("### GRAPH SCHEMA\n{schema_json}\n\n### EXAMPLE PERSPECTIVES\n");
    for (idx, example) in corpus.examples().iter().enumerate() {
        block.push_str(&format!(
            "--- Example {} ({}) ---\n{}\n\n",
            idx + 1,
            example.name,
            example.content.trim_end()
        ));
    }
    Ok(block)
}

/// Prompt asking for the whole batch of perspectives as one JSON array
pub fn build_batch_prompt(
    schema: &SchemaSnapshot,
    corpus: &ExampleCorpus,
    policy: &PromptPolicy,
) -> Result<PromptPayload> {
    let range = policy.perspective_range();
    let system = system_prompt(
        policy,
        &format!("A JSON ARRAY containing {range} perspective objects."),
    );
    let user = format!(
        "{}### TASK\nGenerate {range} distinct Neo4j Bloom perspectives for this schema, each \
         covering a different aspect of the data. Return them as a JSON array.\n",
        context_block(schema, corpus)?
    );
    Ok(PromptPayload { system, user })
}

/// Prompt asking for a single perspective as a JSON object, avoiding names already used
pub fn build_single_prompt(
    schema: &SchemaSnapshot,
    corpus: &ExampleCorpus,
    policy: &PromptPolicy,
    existing_names: &[String],
) -> Result<PromptPayload> {
    let system = system_prompt(policy, "A single JSON OBJECT describing one perspective.");
    let mut user = context_block(schema, corpus)?;
    if !existing_names.is_empty() {
        user.push_str("### ALREADY GENERATED\nDo not repeat these perspectives or their focus:\n");
        for name in existing_names {
            user.push_str(&format!("- {name}\n"));
        }
        user.push('\n');
    }
    user.push_str(
        "### TASK\nGenerate exactly one new Neo4j Bloom perspective for this schema. \
         Return it as a single JSON object.\n",
    );
    Ok(PromptPayload { system, user })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomgen_core::{ExampleDocument, PropertySpec, RelationshipPattern};

    fn schema() -> SchemaSnapshot {
        let mut schema = SchemaSnapshot::default();
        schema.labels.insert(
            "Customer".to_string(),
            vec![PropertySpec::new("customer_unique_id", "String")],
        );
        schema.labels.insert("Order".to_string(), vec![]);
        schema
            .relationships
            .push(RelationshipPattern::new("Customer", "PLACED", "Order"));
        schema
    }

    fn corpus() -> ExampleCorpus {
        ExampleCorpus::from_documents(vec![
            ExampleDocument {
                name: "sales.json".to_string(),
                content: r#"{"name":"Sales","templates":[]}"#.to_string(),
            },
            ExampleDocument {
                name: "support.json".to_string(),
                content: r#"{"name":"Support"}"#.to_string(),
            },
        ])
    }

    #[test]
    fn test_batch_prompt_embeds_schema_and_every_example() {
        let payload = build_batch_prompt(&schema(), &corpus(), &PromptPolicy::default()).unwrap();

        assert!(payload.user.contains("customer_unique_id"));
        assert!(payload.user.contains("\"PLACED\""));
        assert!(payload.user.contains(r#"{"name":"Sales","templates":[]}"#));
        assert!(payload.user.contains(r#"{"name":"Support"}"#));
        assert!(payload.user.contains("Generate 4-5 distinct"));
        assert!(payload.system.contains("JSON ARRAY"));
    }

    #[test]
    fn test_required_fields_are_hard_constraints() {
        let payload = build_batch_prompt(&schema(), &corpus(), &PromptPolicy::default()).unwrap();
        for field in [
            "\"labels\"",
            "\"size\"",
            "\"icon\"",
            "\"cypher\"",
            "\"pathSegments\"",
            "\"hiddenRelationshipTypes\"",
            "\"parentPerspectiveId\"",
        ] {
            assert!(payload.system.contains(field), "{field} missing from system prompt");
        }
        assert!(payload.system.contains("MUST"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let policy = PromptPolicy::default().exactly(3);
        let first = build_batch_prompt(&schema(), &corpus(), &policy).unwrap();
        let second = build_batch_prompt(&schema(), &corpus(), &policy).unwrap();
        assert_eq!(first, second);
        assert!(first.user.contains("Generate 3 distinct"));
    }

    #[test]
    fn test_empty_corpus_is_a_config_error() {
        let empty = ExampleCorpus::from_documents(Vec::new());
        let err = build_batch_prompt(&schema(), &empty, &PromptPolicy::default()).unwrap_err();
        assert!(matches!(err, BloomError::Config(_)));
    }

    #[test]
    fn test_single_prompt_lists_existing_names() {
        let payload = build_single_prompt(
            &schema(),
            &corpus(),
            &PromptPolicy::default(),
            &["Customer 360".to_string()],
        )
        .unwrap();

        assert!(payload.user.contains("- Customer 360"));
        assert!(payload.system.contains("single JSON OBJECT"));
        assert_eq!(payload.messages().len(), 2);
    }
}
