use crate::model::ReportData;

/// Render a self-contained HTML report (data embedded as JSON).
///
/// Important: we avoid `format!()` because the HTML contains many `{}` from JS
/// template literals (e.g., `${x}`), which would conflict with Rust formatting.
pub fn render_html_report(data: &ReportData) -> anyhow::Result<String> {
    // `</` inside a JSON string would end the script element early.
    let json = serde_json::to_string(data)?.replace("</", "<\\/");

    const TEMPLATE: &str = r##"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>System Resource Report</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; }
  main { padding: 12px 16px; }

  .summary { display: flex; gap: 16px; flex-wrap: wrap; font-size: 14px; color: #333; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; }
  .muted { color: #777; font-size: 12px; }

  .chart { margin: 16px 0; }
  .chart svg { width: 100%; height: 220px; border: 1px solid #eee; border-radius: 6px; }
  .legend span { margin-right: 12px; font-size: 13px; }

  table { border-collapse: collapse; margin-top: 8px; min-width: 360px; }
  th, td { border-bottom: 1px solid #eee; padding: 6px 8px; text-align: left; font-size: 14px; }
  th { background: white; border-bottom: 1px solid #ddd; }
  .num { text-align: right; font-variant-numeric: tabular-nums; }
  .tables { display: flex; gap: 24px; flex-wrap: wrap; }
</style>
</head>
<body>
<header>
  <div class="summary" id="summary"></div>
  <div class="muted" id="range"></div>
</header>

<main>
  <div id="charts"></div>
  <h2>Process peaks</h2>
  <div class="tables" id="peaks"></div>
</main>

<script>
// Embedded report data (JSON object literal)
const DATA = __DATA__;

const COLORS = ["#FF4B4B", "#0068C9", "#FFA500", "#800080", "#29B09D", "#7D7D7D"];

function fmt(x, digits = 2) {
  return (x === null || x === undefined) ? "N/A" : Number(x).toFixed(digits);
}

function escapeHtml(s) {
  return String(s)
    .replaceAll("&", "&amp;")
    .replaceAll("<", "&lt;")
    .replaceAll(">", "&gt;")
    .replaceAll('"', "&quot;")
    .replaceAll("'", "&#39;");
}

function renderSummary() {
  const s = DATA.summary;
  const off = s.top_offender;
  document.getElementById("summary").innerHTML = `
    <span class="pill">rows: <b>${s.rows}</b></span>
    <span class="pill">physical memory: <b>${fmt(s.physical_mem_gb)} GB</b></span>
    <span class="pill">OS memory: <b>${fmt(s.os_total_mem_gb)} GB</b></span>
    <span class="pill">CPU max: <b>${fmt(s.peak_cpu_pct)}%</b> avg: <b>${fmt(s.avg_cpu_pct)}%</b></span>
    <span class="pill">peak used: <b>${fmt(s.peak_used_gb)} GB</b> (${fmt(s.peak_usage_pct)}%)</span>
    <span class="pill">swap started: <b>${s.swap_started ? escapeHtml(s.swap_started) : "never"}</b></span>
    <span class="pill">ramp-up: <b>${s.ramp_up ? escapeHtml(s.ramp_up) : "stable or fluctuating"}</b></span>
    <span class="pill">top offender: <b>${off ? escapeHtml(off.process) + " " + fmt(off.max_gb) + " GB" : "N/A"}</b></span>
  `;
  document.getElementById("range").textContent =
    `${s.first || "?"} .. ${s.last || "?"} (quality: ${DATA.quality})`;
}

function renderChart(chart, id) {
  const W = 1000, H = 200, PAD = 4;
  let lo = Infinity, hi = -Infinity;
  for (const s of chart.series) {
    for (const v of s.values) {
      if (v === null) continue;
      lo = Math.min(lo, v);
      hi = Math.max(hi, v);
    }
  }
  if (!isFinite(lo)) { lo = 0; hi = 1; }
  if (hi === lo) hi = lo + 1;
  const n = Math.max(chart.timestamps.length - 1, 1);
  const x = (i) => PAD + (i / n) * (W - 2 * PAD);
  const y = (v) => H - PAD - ((v - lo) / (hi - lo)) * (H - 2 * PAD);

  const paths = chart.series.map((s, k) => {
    let d = "", pen = false;
    s.values.forEach((v, i) => {
      if (v === null) { pen = false; return; }
      d += `${pen ? "L" : "M"}${x(i).toFixed(1)},${y(v).toFixed(1)} `;
      pen = true;
    });
    return `<path d="${d}" fill="none" stroke="${COLORS[k % COLORS.length]}" stroke-width="1.2"/>`;
  }).join("");

  const legend = chart.series.map((s, k) =>
    `<span style="color:${COLORS[k % COLORS.length]}">&#9632; ${escapeHtml(s.name)}</span>`
  ).join("");

  const el = document.createElement("div");
  el.className = "chart";
  if (id) el.id = id;
  el.innerHTML = `
    <h3>${escapeHtml(chart.title)} <span class="muted">${fmt(lo)} .. ${fmt(hi)}, ${chart.timestamps.length} points</span></h3>
    <div class="legend">${legend}</div>
    <svg viewBox="0 0 ${W} ${H}" preserveAspectRatio="none">${paths}</svg>
  `;
  document.getElementById("charts").appendChild(el);
}

// Long-form (timestamp, process, value) rows -> one series per process on a shared time axis.
function renderMemoryTrend() {
  if (DATA.memory_trend.length === 0) return;
  const times = [...new Set(DATA.memory_trend.map((r) => r.timestamp))].sort();
  const slot = new Map(times.map((t, i) => [t, i]));
  const byProcess = new Map();
  for (const r of DATA.memory_trend) {
    if (!byProcess.has(r.process)) byProcess.set(r.process, new Array(times.length).fill(null));
    byProcess.get(r.process)[slot.get(r.timestamp)] = r.value;
  }
  renderChart({
    title: "Top process memory (MB)",
    timestamps: times,
    series: [...byProcess].map(([name, values]) => ({ name, values })),
  }, "memory-trend");
}

function renderPeaks() {
  const root = document.getElementById("peaks");
  for (const table of DATA.peaks) {
    const rows = table.peaks.map((p) => `
      <tr><td>${escapeHtml(p.process)}</td><td class="num">${fmt(p.max_value)}</td></tr>
    `).join("");
    const el = document.createElement("div");
    el.innerHTML = `
      <h3>${escapeHtml(table.column)}</h3>
      <table>
        <thead><tr><th>process</th><th class="num">max</th></tr></thead>
        <tbody>${rows || '<tr><td colspan="2" class="muted">no activity</td></tr>'}</tbody>
      </table>
    `;
    root.appendChild(el);
  }
}

renderSummary();
for (const c of DATA.charts) renderChart(c);
renderMemoryTrend();
renderPeaks();
</script>
</body>
</html>
"##;

    Ok(TEMPLATE.replace("__DATA__", &json))
}
