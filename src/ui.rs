use crate::models::{Entry, Parameter, Prediction};
use chrono::NaiveDate;
use std::{collections::BTreeMap, fmt::Write};

const RATING_SCALE: std::ops::RangeInclusive<u8> = 0..=5;

pub struct PageContext<'a> {
    pub today: NaiveDate,
    pub entry: &'a Entry,
    pub parameters: &'a [Parameter],
    pub values: &'a BTreeMap<String, f64>,
    pub live: &'a BTreeMap<String, Prediction>,
    pub base: &'a BTreeMap<String, Prediction>,
}

pub fn render_page(ctx: &PageContext<'_>) -> String {
    let mut rows = String::new();
    for parameter in ctx.parameters {
        render_parameter(&mut rows, ctx, parameter);
    }
    if rows.is_empty() {
        rows.push_str(r#"<p class="hint">No active parameters yet. Add some through /api/parameters or an import.</p>"#);
    }

    INDEX_HTML
        .replace("{{DATE}}", &ctx.entry.date.to_string())
        .replace("{{TODAY}}", &ctx.today.to_string())
        .replace("{{COMMENT}}", &escape_html(&ctx.entry.comment))
        .replace("{{ROWS}}", &rows)
}

fn render_parameter(out: &mut String, ctx: &PageContext<'_>, parameter: &Parameter) {
    let key = escape_html(&parameter.key);
    let current = ctx.values.get(&parameter.key).copied();
    let current_text = current.map(|value| value.to_string()).unwrap_or_default();

    let _ = write!(
        out,
        r#"<div class="param"><div class="param-head"><span class="param-label">{label}</span></div><div class="rating-buttons" data-name="{key}">"#,
        label = escape_html(&parameter.label),
    );
    for rating in RATING_SCALE {
        let selected = if current == Some(f64::from(rating)) { " selected" } else { "" };
        let _ = write!(
            out,
            r#"<button type="button" class="rate{selected}" data-value="{rating}">{rating}</button>"#
        );
    }
    let _ = write!(
        out,
        r#"</div><input type="hidden" id="input-{key}" value="{current_text}" /><div class="predictions">{live}{base}</div></div>"#,
        live = prediction_badge("predicted", "Live", &key, ctx.live.get(&parameter.key)),
        base = prediction_badge("predicted-base", "Base", &key, ctx.base.get(&parameter.key)),
    );
}

fn prediction_badge(prefix: &str, title: &str, key: &str, prediction: Option<&Prediction>) -> String {
    match prediction {
        Some(prediction) => {
            let delta = prediction
                .delta
                .map(|delta| format!(" (Δ {delta:+.1})"))
                .unwrap_or_default();
            format!(
                r#"<span id="{prefix}-{key}" class="prediction" data-color="{color}">{title}: {value:.1}{delta}</span>"#,
                color = prediction.color.as_str(),
                value = prediction.value,
            )
        }
        None => format!(r#"<span id="{prefix}-{key}" class="prediction">{title}: n/a</span>"#),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Diary</title>
  <style>
    :root {
      --bg: #f6f1e7;
      --ink: #2b2a28;
      --accent: #2f4858;
      --card: rgba(255, 255, 255, 0.9);
      --green: #2d7a4b;
      --yellow: #b8860b;
      --red: #c63b2b;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 24px 16px 48px;
    }

    .app {
      width: min(760px, 100%);
      background: var(--card);
      border-radius: 20px;
      box-shadow: 0 18px 48px rgba(47, 72, 88, 0.16);
      padding: 28px;
      display: grid;
      gap: 20px;
    }

    header {
      display: flex;
      flex-wrap: wrap;
      justify-content: space-between;
      align-items: center;
      gap: 12px;
    }

    h1 {
      margin: 0;
      font-size: 1.8rem;
    }

    .param {
      display: grid;
      gap: 6px;
      padding: 12px 0;
      border-bottom: 1px solid rgba(47, 72, 88, 0.1);
    }

    .param-label {
      font-weight: 600;
    }

    .rating-buttons {
      display: flex;
      gap: 6px;
    }

    .rate {
      border: 1px solid var(--accent);
      background: white;
      color: var(--accent);
      border-radius: 999px;
      width: 40px;
      height: 40px;
      cursor: pointer;
    }

    .rate.selected {
      background: var(--accent);
      color: white;
    }

    .predictions {
      display: flex;
      gap: 14px;
      font-size: 0.9rem;
      color: #6b645d;
    }

    .prediction[data-color="green"] {
      color: var(--green);
    }

    .prediction[data-color="yellow"] {
      color: var(--yellow);
    }

    .prediction[data-color="red"] {
      color: var(--red);
    }

    textarea {
      width: 100%;
      border-radius: 12px;
      padding: 10px;
      font: inherit;
    }

    .status {
      min-height: 1.2em;
      font-size: 0.9rem;
    }

    .status[data-type="error"] {
      color: var(--red);
    }

    .hint {
      margin: 0;
      color: #6f6a65;
      font-size: 0.9rem;
    }
  </style>
</head>
<body>
  <main class="app" id="diary" data-date="{{DATE}}">
    <header>
      <h1>Diary for {{DATE}}</h1>
      <form method="get" action="/">
        <input type="date" name="date" value="{{DATE}}" max="{{TODAY}}" />
        <button type="submit">Open</button>
      </form>
    </header>

    <section id="parameters">{{ROWS}}</section>

    <section>
      <label for="comment">Comment</label>
      <textarea id="comment" rows="2">{{COMMENT}}</textarea>
    </section>

    <form method="post" action="/train">
      <button type="submit">Retrain base models</button>
    </form>

    <div class="status" id="status"></div>
    <p class="hint">Live hints are refit on every change; base hints come from the last retrain.</p>
  </main>

  <script>
    const diary = document.getElementById('diary');
    const entryDate = diary.dataset.date;
    const statusEl = document.getElementById('status');
    const formValues = {};

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const postJson = async (url, body) => {
      const res = await fetch(url, {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify(body)
      });
      if (!res.ok) {
        throw new Error((await res.text()) || 'Request failed');
      }
      return res.json();
    };

    const renderBadge = (id, title, prediction) => {
      const el = document.getElementById(id);
      if (!el) {
        return;
      }
      if (!prediction) {
        el.textContent = `${title}: n/a`;
        delete el.dataset.color;
        return;
      }
      const delta = prediction.delta === null ? '' : ` (Δ ${prediction.delta > 0 ? '+' : ''}${prediction.delta.toFixed(1)})`;
      el.textContent = `${title}: ${prediction.value.toFixed(1)}${delta}`;
      el.dataset.color = prediction.color;
    };

    const refreshPredictions = async () => {
      const data = await postJson('/api/predict', { values: formValues });
      document.querySelectorAll('.rating-buttons').forEach((group) => {
        const key = group.dataset.name;
        renderBadge(`predicted-${key}`, 'Live', data.live[key]);
        renderBadge(`predicted-base-${key}`, 'Base', data.base[key]);
      });
    };

    document.querySelectorAll('.rating-buttons').forEach((group) => {
      const key = group.dataset.name;
      const input = document.getElementById(`input-${key}`);
      const buttons = Array.from(group.querySelectorAll('button'));
      if (input.value !== '') {
        formValues[key] = input.value;
      }

      buttons.forEach((button) => {
        button.addEventListener('click', () => {
          const wasSelected = button.classList.contains('selected');
          buttons.forEach((other) => other.classList.remove('selected'));
          let value = null;
          if (wasSelected) {
            input.value = '';
            delete formValues[key];
          } else {
            button.classList.add('selected');
            input.value = button.dataset.value;
            formValues[key] = button.dataset.value;
            value = parseFloat(button.dataset.value);
          }

          postJson('/api/entry/value', { parameter: key, value, date: entryDate })
            .then(() => refreshPredictions())
            .then(() => setStatus('Saved', 'ok'))
            .catch((err) => setStatus(err.message, 'error'));
        });
      });
    });

    document.getElementById('comment').addEventListener('change', (event) => {
      postJson('/api/entry/comment', { date: entryDate, comment: event.target.value })
        .then(() => setStatus('Comment saved', 'ok'))
        .catch((err) => setStatus(err.message, 'error'));
    });
  </script>
</body>
</html>
"#;
