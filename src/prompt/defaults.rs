//! Built-in prompt templates. Each can be replaced by `<name>.tera` in
//! `prompts.template_dir`.

pub(super) const PARSE_REQUEST: &str = r#"You turn a marketing request into a structured brief.

Read the user's message and extract:
- "topic": one sentence describing what the post should be about.
- "links": every URL the user supplied, exactly as written.
- "style": "news" when the user asks for a news-style or announcement post,
  "education" when they ask for an explainer or tutorial-style post,
  otherwise "default".

Respond with a single JSON object and nothing else:
{"topic": "...", "links": ["..."], "style": "default"}"#;

pub(super) const RELEVANCE: &str = r#"You verify sources for a social media post about:
{{ topic }}

The user message is the text content of one web page. Decide whether the page
is genuinely about this topic, not merely mentioning it in passing.

Respond with a single JSON object and nothing else:
{"reasoning": "one or two sentences", "relevant": true}"#;

pub(super) const REPORT_SYSTEM: &str = r#"You are a research analyst preparing a report that a social media writer will use to draft a post.
{% if style == "news" %}
Focus on what is new: the announcement, release or event, when it happened,
who is involved and why it matters right now. Quote concrete numbers and names.
{% else %}
Focus on what the subject is, what problem it solves, how it works at a high
level and who benefits from it. Keep the technical depth accessible.
{% endif %}
Only use facts found in the provided documents. Do not speculate.

Structure the report as:
1. Introduction
2. Key details
3. Why it matters

Wrap the final report in <report></report> tags."#;

pub(super) const REPORT_CONTENT: &str = r#"Write the report on the following topic:
{{ topic }}

Here are the source documents:

{{ documents }}"#;

pub(super) const POST_SYSTEM: &str = r#"You are a social media writer for a technical company. You write LinkedIn posts from research reports.
{% if style == "news" %}
Write like a concise news update: lead with the announcement, follow with one
or two supporting details, close with why readers should care.
{% elif style == "education" %}
Write like a short explainer: open with the problem, explain the idea plainly,
close with a takeaway the reader can apply.
{% else %}
Write an engaging post: a strong one-line hook, a short body covering the
most interesting details, and a call to action.
{% endif %}
Rules:
- Keep it short and scannable. No hashtags.
- Use at most one emoji.
- Include the source link once, in the call to action.
{% if reflections | length > 0 %}
Also follow these rules learned from earlier reviews:
{% for rule in reflections %}- {{ rule }}
{% endfor %}{% endif %}
Wrap the post in <post></post> tags."#;

pub(super) const POST_REQUEST: &str = r#"Here is the report:

<report>
{{ report }}
</report>

The source link to include is: {{ link }}"#;

pub(super) const CONDENSE_SYSTEM: &str = r#"You are an editor. The post below is {{ original_post_length }} characters long, excluding links, and must be at most {{ max_post_length }} characters.

Condense it while keeping the hook, the most important facts and the call to
action with this link: {{ link }}

For reference, this is the report the post was written from:
<report>
{{ report }}
</report>
{% if reflections | length > 0 %}
Follow these rules learned from earlier reviews:
{% for rule in reflections %}- {{ rule }}
{% endfor %}{% endif %}
Wrap the condensed post in <post></post> tags."#;

pub(super) const CONDENSE_REQUEST: &str = r#"Here is the post I'd like to condense:

{{ post }}"#;

pub(super) const REWRITE_SYSTEM: &str = r#"You are an editor revising a LinkedIn post based on reviewer feedback.

Here is the current post:
<post>
{{ original_post }}
</post>
{% if reflections | length > 0 %}
Keep following these rules:
{% for rule in reflections %}- {{ rule }}
{% endfor %}{% endif %}
The user message contains the reviewer's feedback. Apply it, change nothing
else, and wrap the revised post in <post></post> tags."#;

pub(super) const ROUTE_RESPONSE: &str = r#"A reviewer responded to a scheduled LinkedIn post.

Post:
{{ post }}

Scheduled for: {{ date_or_priority }}

Reviewer response:
{{ user_response }}

Classify the response:
- "rewrite_post": they want the post text changed.
- "update_date": they want the publish date or priority changed.
- "unknown_response": anything else.

Respond with a single JSON object and nothing else:
{"route": "rewrite_post"}"#;

pub(super) const EXTRACT_DATE: &str = r#"The current time is {{ now }} ({{ timezone }}).

Extract the publish date the reviewer asked for from their message. Answer
with either a priority ("p1", "p2" or "p3") or a date formatted exactly as
MM/DD/YYYY HH:MM AM/PM ZONE, for example "03/07/2026 09:30 AM PST". If the
message contains no usable date, use null.

Respond with a single JSON object and nothing else:
{"date": "03/07/2026 09:30 AM PST"}"#;

pub(super) const VALIDATE_IMAGES: &str = r#"You pick images for a LinkedIn post. The user message lists candidate
image URLs taken from the post's sources, each with an index.

Keep an image only when it illustrates the post or the report below: product
screenshots, diagrams, charts, photos of the people or event involved. Drop
logos, icons, avatars, ads, tracking pixels and unrelated stock photos.

<post>
{{ post }}
</post>

<report>
{{ report }}
</report>

List the indices of the images to keep, comma separated, inside
<relevant_indices></relevant_indices> tags. Leave the tags empty when none fit."#;

pub(super) const RERANK_IMAGES: &str = r#"You rank images for a LinkedIn post. The user message lists image URLs,
each with an index. Order them from the best fit for the post to the worst.

<post>
{{ post }}
</post>

<report>
{{ report }}
</report>

Return every index exactly once, comma separated, best first, inside
<reranked_indices></reranked_indices> tags."#;

pub(super) const REVIEW_DESCRIPTION: &str = r#"{% if unknown_response %}# <div style="color: red;">UNKNOWN/INVALID RESPONSE RECEIVED: '{{ unknown_response }}'</div>

<div style="color: red;">Please respond with either a request to edit/rewrite the post, or a valid date/time to schedule the post.</div>

{% endif %}# Schedule post

Using these URL(s), a post was generated for topic: {{ topic }}
{% for link in relevant_links %}- {{ link }}
{% endfor %}
## Post
```
{{ post }}
```

## Schedule date
The post is scheduled for **{{ schedule_date }}**. Edit the date field to
change it. Accepted formats: `MM/dd/yyyy hh:mm a z` (for example
`03/07/2026 09:30 AM PST`) or a priority:
- `p1`: Saturday/Sunday 08:00-10:00
- `p2`: Friday/Monday 08:00-10:00, Saturday/Sunday 11:30-13:00
- `p3`: Saturday/Sunday 13:00-17:00
{% if not text_only %}
## Image
{% if image %}Attached: {{ image }}
{% else %}No image attached.
{% endif %}{% if image_options | length > 0 %}Candidates:
{% for option in image_options %}- {{ option }}
{% endfor %}{% endif %}
Set the image field to a URL to attach it, or to `remove` (or empty) to drop it.
{% endif %}
## Instructions
- **accept**: schedule the post as shown.
- **edit**: change the post, date or image, then schedule.
- **response**: describe a change ("make it shorter", "post next Monday").
- **ignore**: discard the post.

## Report
{{ report }}"#;

pub(super) const PUBLISH_TASK: &str = r#"Open LinkedIn in the logged-in browser session and create a new post.

Paste the following text into the post composer exactly as written:
<post>
{{ post }}
</post>
{% if image_path %}
Attach the image file located at: {{ image_path }}
{% endif %}{% if draft_mode %}
Do NOT click the final "Post" button. Stop once the post is composed.
{% else %}
Click "Post" and wait until LinkedIn confirms the post was published.
{% endif %}"#;
