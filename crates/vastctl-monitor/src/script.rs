/// Inspects the instance's boot log and prints a status block.
///
/// Output is a `STATUS:` and a `DETAILS:` line followed by any of the
/// `TUNNEL_URLS:`, `LAST_LOG:`, `CURRENT_DOWNLOAD:` and `ERROR_DETAILS:`
/// sections. Section bodies are indented by two spaces, except tunnel URLs
/// which are `Service: url` lines. The first matching state wins.
pub const STATUS_SCRIPT: &str = r#"#!/bin/bash
ONSTART_LOG="/var/log/onstart.log"

indent() {
  sed 's/^/  /'
}

tunnel_urls() {
  echo "TUNNEL_URLS:"
  grep -h "Default Tunnel started" /var/log/*.log 2>/dev/null | while read -r line; do
    url=$(echo "$line" | grep -o 'https://[^?]*')
    case "$line" in
      *8188*) echo "ComfyUI: $url" ;;
      *1111*) echo "Portal: $url" ;;
      *8080*) echo "Jupyter: $url" ;;
      *8384*) echo "Syncthing: $url" ;;
    esac
  done
}

if grep -q "To see the GUI go to:" "$ONSTART_LOG" 2>/dev/null; then
  echo "STATUS: READY"
  echo "DETAILS: ComfyUI is fully loaded and running"
  tunnel_urls
  echo "LAST_LOG:"
  tail -n 3 "$ONSTART_LOG" | indent
  exit 0
fi

if grep -q "Provisioning complete!" "$ONSTART_LOG" 2>/dev/null; then
  echo "STATUS: STARTING_APP"
  echo "DETAILS: Provisioning complete, ComfyUI starting up"
  tunnel_urls
  echo "LAST_LOG:"
  tail -n 5 "$ONSTART_LOG" | indent
  exit 0
fi

if grep -q "Downloading.*model(s) to" "$ONSTART_LOG" 2>/dev/null; then
  done_count=$(grep -c "✓ Downloaded to:" "$ONSTART_LOG" 2>/dev/null)
  echo "STATUS: DOWNLOADING"
  echo "DETAILS: Downloading models (${done_count:-0} completed)"
  progress=$(grep "Using HF Transfer\|Speed:" "$ONSTART_LOG" 2>/dev/null | tail -n 2)
  if [ -n "$progress" ]; then
    echo "CURRENT_DOWNLOAD:"
    echo "$progress" | indent
  fi
  echo "LAST_LOG:"
  tail -n 3 "$ONSTART_LOG" | indent
  exit 0
fi

if [ -f "/.provisioning" ] || grep -q "Provisioning container" "$ONSTART_LOG" 2>/dev/null; then
  echo "STATUS: PROVISIONING"
  echo "DETAILS: Running initial provisioning script"
  echo "LAST_LOG:"
  tail -n 5 "$ONSTART_LOG" 2>/dev/null | indent
  exit 0
fi

if grep -iEq "error|failed|traceback" "$ONSTART_LOG" 2>/dev/null; then
  echo "STATUS: ERROR"
  echo "DETAILS: Error detected in logs"
  echo "ERROR_DETAILS:"
  grep -iE "error|failed|traceback" "$ONSTART_LOG" 2>/dev/null | tail -n 3 | indent
  exit 0
fi

echo "STATUS: INITIALIZING"
echo "DETAILS: Instance booting up, waiting for services to start"
if [ -f "$ONSTART_LOG" ]; then
  echo "LAST_LOG:"
  tail -n 3 "$ONSTART_LOG" | indent
fi
"#;
