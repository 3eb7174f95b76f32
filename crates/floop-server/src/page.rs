//! Electric-mode page rendering
//!
//! The page fetches `/api/activate` and animates the step snapshots.
//! It embeds its own API base URL, so it must be rendered AFTER the
//! listener is bound; the server caches the rendered bytes and serves
//! them unchanged for the process lifetime.

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>floop - behavior graph</title>
<style>
  body { font-family: ui-monospace, monospace; background: #0b0e14; color: #d7dae0; margin: 2rem; }
  h1 { font-size: 1.1rem; letter-spacing: 0.08em; }
  input, button { font: inherit; background: #151a23; color: inherit; border: 1px solid #2c3442; padding: 0.35rem 0.6rem; }
  button { cursor: pointer; }
  #steps { margin-top: 1.5rem; }
  .step { margin-bottom: 0.8rem; border-left: 2px solid #2c3442; padding-left: 0.8rem; }
  .step.final { border-color: #e2b714; }
  .node { display: inline-block; margin: 0.15rem 0.4rem 0.15rem 0; padding: 0.1rem 0.45rem; border-radius: 3px; }
  .pos { background: #14321b; }
  .neg { background: #3a1420; }
  .err { color: #e06c75; }
</style>
</head>
<body>
<h1>floop // electric mode</h1>
<p>
  <input id="seed" placeholder="behavior id" size="32">
  <button id="go">activate</button>
  <span id="status"></span>
</p>
<div id="steps"></div>
<script>
const API_BASE = "__API_BASE__";
const statusEl = document.getElementById("status");
const stepsEl = document.getElementById("steps");

async function activate() {
  const seed = document.getElementById("seed").value.trim();
  stepsEl.textContent = "";
  statusEl.textContent = "";
  if (!seed) { statusEl.textContent = "enter a seed id"; return; }
  const res = await fetch(API_BASE + "/api/activate?seed=" + encodeURIComponent(seed));
  if (!res.ok) {
    statusEl.innerHTML = '<span class="err">' + res.status + " " + res.statusText + "</span>";
    return;
  }
  const steps = await res.json();
  let delay = 0;
  for (const step of steps) {
    setTimeout(() => renderStep(step), delay);
    delay += 350;
  }
}

function renderStep(step) {
  const div = document.createElement("div");
  div.className = step.final ? "step final" : "step";
  const head = document.createElement("div");
  head.textContent = "step " + step.step + (step.final ? " (final)" : "");
  div.appendChild(head);
  for (const [id, value] of Object.entries(step.activation)) {
    const span = document.createElement("span");
    span.className = value >= 0 ? "node pos" : "node neg";
    span.textContent = id + " " + value.toFixed(3);
    div.appendChild(span);
  }
  stepsEl.appendChild(div);
}

document.getElementById("go").addEventListener("click", activate);
document.getElementById("seed").addEventListener("keydown", (e) => {
  if (e.key === "Enter") activate();
});
</script>
</body>
</html>
"#;

/// Render the page with its API base URL baked in.
pub fn render(api_base: &str) -> String {
    TEMPLATE.replace("__API_BASE__", api_base.trim_end_matches('/'))
}
