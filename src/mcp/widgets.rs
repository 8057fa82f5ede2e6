/*
 * Responsibility
 * - assistant host に公開する widget の定義 (resource template + tool)
 * - tool 入力の型付けと structuredContent / _meta の組み立て
 */
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub const WIDGET_MIME_TYPE: &str = "text/html+skybridge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    ShowContent,
    PizzaList,
    ProjectList,
    ProjectViewer,
}

#[derive(Debug, Clone, Copy)]
pub struct Widget {
    pub kind: WidgetKind,
    /// Tool name.
    pub id: &'static str,
    /// Resource name.
    pub resource: &'static str,
    pub title: &'static str,
    pub template_uri: &'static str,
    /// Page on the widget host that renders this widget.
    pub path: &'static str,
    pub invoking: &'static str,
    pub invoked: &'static str,
    pub description: &'static str,
    pub tool_description: &'static str,
}

pub const WIDGETS: &[Widget] = &[
    Widget {
        kind: WidgetKind::ShowContent,
        id: "show_content",
        resource: "content-widget",
        title: "Show Content",
        template_uri: "ui://widget/content-template.html",
        path: "/",
        invoking: "Loading content...",
        invoked: "Content loaded",
        description: "Displays the homepage content",
        tool_description: "Fetch and display the homepage content with the name of the user",
    },
    Widget {
        kind: WidgetKind::PizzaList,
        id: "pizza_list",
        resource: "pizza-list-widget",
        title: "Pizza List",
        template_uri: "ui://widget/pizza-list-template.html",
        path: "/pizza-list",
        invoking: "Loading pizza list...",
        invoked: "Pizza list loaded",
        description: "Displays the National Best Pizza List with rankings and ratings",
        tool_description: "Displays the National Best Pizza List with rankings and ratings",
    },
    Widget {
        kind: WidgetKind::ProjectList,
        id: "project_list",
        resource: "project-list-widget",
        title: "Project List",
        template_uri: "ui://widget/project-list-template.html",
        path: "/project-list",
        invoking: "Loading projects...",
        invoked: "Projects loaded",
        description: "Displays your 3D model projects",
        tool_description: "List the signed-in user's 3D model projects",
    },
    Widget {
        kind: WidgetKind::ProjectViewer,
        id: "project_viewer",
        resource: "project-viewer-widget",
        title: "Project Viewer",
        template_uri: "ui://widget/project-viewer-template.html",
        path: "/project-viewer",
        invoking: "Opening model...",
        invoked: "Model ready",
        description: "Displays a 3D model in an interactive viewer",
        tool_description: "Open a project's 3D model in the interactive viewer",
    },
];

pub fn by_tool(name: &str) -> Option<&'static Widget> {
    WIDGETS.iter().find(|w| w.id == name)
}

pub fn by_template(uri: &str) -> Option<&'static Widget> {
    WIDGETS.iter().find(|w| w.template_uri == uri)
}

#[derive(Debug, Deserialize)]
struct ShowContentInput {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryInput {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectViewerInput {
    project_name: String,
    urn: String,
}

/// Tool output before `_meta` is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Map<String, Value>,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Missing or null arguments behave like `{}`.
fn parse<T: for<'de> Deserialize<'de>>(arguments: &Value) -> Result<T, serde_json::Error> {
    match arguments {
        Value::Null => serde_json::from_value(json!({})),
        other => serde_json::from_value(other.clone()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Widget {
    /// `_meta` attached to the tool descriptor and to every tool result.
    pub fn tool_meta(&self) -> Value {
        json!({
            "openai/outputTemplate": self.template_uri,
            "openai/toolInvocation/invoking": self.invoking,
            "openai/toolInvocation/invoked": self.invoked,
            "openai/widgetAccessible": false,
            "openai/resultCanProduceWidget": true,
        })
    }

    pub fn resource_meta(&self) -> Value {
        json!({
            "openai/widgetDescription": self.description,
            "openai/widgetPrefersBorder": true,
        })
    }

    pub fn input_schema(&self) -> Value {
        match self.kind {
            WidgetKind::ShowContent => json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name of the user to display on the homepage"
                    }
                },
                "required": ["name"]
            }),
            WidgetKind::PizzaList => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Optional search query to filter pizzerias"
                    }
                }
            }),
            WidgetKind::ProjectList => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Optional search query to filter projects by name"
                    }
                }
            }),
            WidgetKind::ProjectViewer => json!({
                "type": "object",
                "properties": {
                    "projectName": {
                        "type": "string",
                        "description": "Display name of the project"
                    },
                    "urn": {
                        "type": "string",
                        "description": "Model URN to load in the viewer"
                    }
                },
                "required": ["projectName", "urn"]
            }),
        }
    }

    /// Echo typed inputs back as structured content. Fails on arguments that do not
    /// match the input schema.
    pub fn call(&self, arguments: &Value) -> Result<ToolOutput, serde_json::Error> {
        let mut structured = Map::new();

        let text = match self.kind {
            WidgetKind::ShowContent => {
                let input: ShowContentInput = parse(arguments)?;
                structured.insert("name".into(), Value::String(input.name.clone()));
                input.name
            }
            WidgetKind::PizzaList => {
                let query = non_empty(parse::<QueryInput>(arguments)?.query);
                let text = match &query {
                    Some(q) => format!("Showing pizza places matching: {q}"),
                    None => "Displaying the National Best Pizza List".to_string(),
                };
                if let Some(q) = query {
                    structured.insert("query".into(), Value::String(q));
                }
                text
            }
            WidgetKind::ProjectList => {
                let query = non_empty(parse::<QueryInput>(arguments)?.query);
                let text = match &query {
                    Some(q) => format!("Showing projects matching: {q}"),
                    None => "Displaying your projects".to_string(),
                };
                if let Some(q) = query {
                    structured.insert("query".into(), Value::String(q));
                }
                text
            }
            WidgetKind::ProjectViewer => {
                let input: ProjectViewerInput = parse(arguments)?;
                let text = format!("Opening {} in the viewer", input.project_name);
                structured.insert("projectName".into(), Value::String(input.project_name));
                structured.insert("urn".into(), Value::String(input.urn));
                text
            }
        };

        structured.insert("timestamp".into(), Value::String(timestamp()));
        Ok(ToolOutput { text, structured })
    }
}
