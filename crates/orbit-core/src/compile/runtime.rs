//! Support files written next to the synthesized program.

/// `src/orbit.rs` of the scratch crate: display, input and heartbeat helpers
/// that talk to the kernel over the sideband.
pub const RUNTIME_SOURCE: &str = include_str!("../../runtime/orbit.rs");

/// Path of the runtime module inside the scratch crate.
pub const RUNTIME_FILE: &str = "src/orbit.rs";

/// Loader staged next to a wasm module.
///
/// Instantiates `cell.wasm` from the same directory and calls its `main`
/// export when there is one.
pub fn wasm_loader(module_url: &str) -> String {
    format!(
        r#"// Generated by orbit.
export async function run() {{
  const response = await fetch("{module_url}");
  const bytes = await response.arrayBuffer();
  const {{ instance }} = await WebAssembly.instantiate(bytes, {{}});
  const entry = instance.exports.main || instance.exports._start;
  if (typeof entry === "function") {{
    entry(0, 0);
  }}
  return instance;
}}
"#
    )
}

/// HTML published for a wasm submission.
pub fn wasm_display(loader_url: &str, element_id: &str) -> String {
    format!(
        r#"<div id="{element_id}"></div>
<script type="module">
import {{ run }} from "{loader_url}";
run().catch((e) => {{
  document.getElementById("{element_id}").innerText = "wasm error: " + e;
}});
</script>
"#
    )
}
