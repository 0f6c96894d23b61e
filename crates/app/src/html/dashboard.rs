pub const DASHBOARD_HTML: &str = r#"
<!doctype html>
<html lang="en">

<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Meter Stream</title>
  <style>
    :root {
      --bg: #111418;
      --panel: #1b2027;
      --ink: #e6e9ee;
      --muted: #8a94a3;
      --ok: #3ccf6e;
      --warn: #f0b429;
      --bad: #ef5350;
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      font-family: ui-sans-serif, system-ui, sans-serif;
      background: var(--bg);
      color: var(--ink);
    }

    header {
      display: flex;
      align-items: center;
      justify-content: space-between;
      padding: 12px 20px;
      background: var(--panel);
      border-bottom: 1px solid #2a313b;
    }

    header h1 { font-size: 18px; margin: 0; letter-spacing: 0.04em; }

    main {
      display: grid;
      grid-template-columns: minmax(0, 2fr) minmax(280px, 1fr);
      gap: 16px;
      padding: 16px 20px;
    }

    .panel {
      background: var(--panel);
      border-radius: 8px;
      padding: 12px;
    }

    #frame {
      width: 100%;
      aspect-ratio: 4 / 3;
      object-fit: contain;
      background: #000;
      border-radius: 6px;
    }

    table { width: 100%; border-collapse: collapse; font-variant-numeric: tabular-nums; }
    th, td { text-align: left; padding: 6px 4px; border-bottom: 1px solid #2a313b; }
    th { color: var(--muted); font-weight: 500; }

    .status-OK { color: var(--ok); }
    .status-OUT_OF_RANGE { color: var(--warn); }
    .status-NOT_FOUND { color: var(--bad); }

    .meta { color: var(--muted); font-size: 13px; margin-top: 8px; }

    button {
      background: #2d6cdf;
      color: white;
      border: 0;
      border-radius: 6px;
      padding: 6px 14px;
      cursor: pointer;
    }

    button.secondary { background: #3a414c; }
    button:disabled { opacity: 0.5; cursor: default; }
  </style>
</head>

<body>
  <header>
    <h1>METER STREAM</h1>
    <div>
      <span id="connection" class="meta">connecting…</span>
      <button id="start" disabled>Start</button>
      <button id="stop" class="secondary" disabled>Stop</button>
    </div>
  </header>

  <main>
    <section class="panel">
      <img id="frame" alt="meter frame" />
      <div class="meta">
        frame <span id="frame-number">-</span> · <span id="frame-time">-</span> ·
        <span id="rate">-</span> fps
      </div>
    </section>

    <section class="panel">
      <table>
        <thead>
          <tr><th>Gauge</th><th>Value</th><th>Angle</th><th>Conf.</th><th>Status</th></tr>
        </thead>
        <tbody id="readings"></tbody>
      </table>
      <div id="session" class="meta"></div>
    </section>
  </main>

  <script>
    const startButton = document.getElementById("start");
    const stopButton = document.getElementById("stop");
    const connection = document.getElementById("connection");
    const readingsBody = document.getElementById("readings");
    let sessionId = null;
    let lastFrameAt = null;

    const fmt = (value, digits) => (value === null || value === undefined ? "-" : value.toFixed(digits));

    function renderReadings(readings) {
      readingsBody.replaceChildren(...readings.map((reading) => {
        const row = document.createElement("tr");
        const cells = [
          reading.gauge_id,
          reading.value === null ? "-" : `${fmt(reading.value, 1)} ${reading.unit}`,
          `${fmt(reading.angle, 1)}°`,
          fmt(reading.confidence, 2),
          reading.status,
        ];
        cells.forEach((text, index) => {
          const cell = document.createElement("td");
          cell.textContent = text;
          if (index === 4) cell.className = `status-${reading.status}`;
          row.appendChild(cell);
        });
        return row;
      }));
    }

    async function control(action) {
      if (sessionId === null) return;
      const response = await fetch(`/api/sessions/${sessionId}/${action}`, { method: "POST" });
      const body = await response.json();
      if (!response.ok) {
        connection.textContent = body.error || response.statusText;
        return;
      }
      startButton.disabled = body.state !== "idle";
      stopButton.disabled = !body.running;
    }

    startButton.addEventListener("click", () => control("start"));
    stopButton.addEventListener("click", () => control("stop"));

    const events = new EventSource("/api/events");

    events.addEventListener("connection_response", (event) => {
      const hello = JSON.parse(event.data);
      sessionId = hello.session_id;
      connection.textContent = `session ${sessionId} · ${hello.gauges} gauges @ ${hello.target_fps} fps`;
      control("start");
    });

    events.addEventListener("meter_data", (event) => {
      const result = JSON.parse(event.data);
      document.getElementById("frame").src = `data:${result.frame.mime};base64,${result.frame.data}`;
      document.getElementById("frame-number").textContent = result.frame_number;
      document.getElementById("frame-time").textContent = result.time;
      const now = performance.now();
      if (lastFrameAt !== null) {
        document.getElementById("rate").textContent = (1000 / (now - lastFrameAt)).toFixed(1);
      }
      lastFrameAt = now;
      renderReadings(result.readings);
    });

    events.addEventListener("stopped", (event) => {
      const status = JSON.parse(event.data);
      connection.textContent = `stopped: ${status.stop_reason || status.state}`;
      document.getElementById("session").textContent =
        `${status.frames_published} frames published` + (status.last_error ? ` · last error: ${status.last_error}` : "");
      startButton.disabled = true;
      stopButton.disabled = true;
      events.close();
    });

    events.onerror = () => {
      connection.textContent = "disconnected";
    };
  </script>
</body>

</html>
"#;
