//! The single-page front end.

use groupchat_core::Roster;

/// Render the index page with the roster filled in.
pub fn render_index(roster: &Roster) -> String {
    let participants: String = roster
        .participants()
        .iter()
        .map(|p| {
            format!(
                r#"<li style="color:{}">{} {}</li>"#,
                escape_html(p.presentation.color.as_deref().unwrap_or("inherit")),
                escape_html(p.presentation.emoji.as_deref().unwrap_or("")),
                escape_html(&p.name),
            )
        })
        .collect();

    INDEX_TEMPLATE.replace("{{participants}}", &participants)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const INDEX_TEMPLATE: &str = r#"<!doctype html>
<html lang="zh">
<head>
<meta charset="utf-8">
<title>AI 群聊</title>
<style>
body { font-family: sans-serif; max-width: 760px; margin: 2em auto; }
#log div { margin: .6em 0; white-space: pre-wrap; }
.notice { color: #888; font-style: italic; }
.error { color: #c0392b; }
</style>
</head>
<body>
<h1>AI 群聊</h1>
<ul>{{participants}}</ul>
<form id="ask">
  <input id="question" size="60" placeholder="你想让 AI 们讨论的问题">
  <input id="rounds" type="number" min="0" value="2" style="width:4em">
  <button>开始</button>
</form>
<div id="log"></div>
<script>
const log = document.getElementById('log');
function line(text, cls, color) {
  const div = document.createElement('div');
  div.textContent = text;
  if (cls) div.className = cls;
  if (color) div.style.color = color;
  log.appendChild(div);
  return div;
}
const handlers = {
  turn: m => line(`${m.emoji ? m.emoji + ' ' : ''}${m.speaker}：${m.content}`, m.type === 'error' ? 'error' : '', m.color),
  round: r => line(`📢 第 ${r.round} 轮讨论`, 'notice'),
  composing: c => line(`${c.speaker} 正在思考...`, 'notice'),
  summarizing: () => line('📋 讨论总结', 'notice'),
  cancelled: () => line('已取消', 'notice'),
  done: () => line('讨论结束', 'notice'),
};
document.getElementById('ask').addEventListener('submit', async e => {
  e.preventDefault();
  log.innerHTML = '';
  const body = JSON.stringify({
    question: document.getElementById('question').value,
    rounds: document.getElementById('rounds').value,
  });
  const res = await fetch('/chat/stream', { method: 'POST', headers: { 'Content-Type': 'application/json' }, body });
  if (!res.ok) { line((await res.json()).error, 'error'); return; }
  const reader = res.body.getReader();
  const decoder = new TextDecoder();
  let buffer = '';
  for (;;) {
    const { value, done } = await reader.read();
    if (done) break;
    buffer += decoder.decode(value, { stream: true });
    let cut;
    while ((cut = buffer.indexOf('\n\n')) >= 0) {
      const block = buffer.slice(0, cut);
      buffer = buffer.slice(cut + 2);
      let event = 'message', data = '';
      for (const l of block.split('\n')) {
        if (l.startsWith('event:')) event = l.slice(6).trim();
        else if (l.startsWith('data:')) data += l.slice(5).trim();
      }
      if (handlers[event] && data) handlers[event](JSON.parse(data));
    }
  }
});
</script>
</body>
</html>
"#;
