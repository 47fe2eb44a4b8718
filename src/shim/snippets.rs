//! JavaScript shims for the GM_* APIs.
//!
//! Content shims are prepended to the transformed script. Background
//! handlers are concatenated into the service worker and answer the
//! messages their content shim sends.

pub const ADD_STYLE: &str = r#"
function GM_addStyle(css) {
  var style = document.createElement('style');
  style.textContent = css;
  (document.head || document.documentElement).appendChild(style);
  return style;
}
"#;

/// chrome.storage is async while the GM API is not, so values are served
/// from a cache filled once at load time.
pub const STORAGE: &str = r#"
var __gmStorage = {};
var __gmStorageReady = false;
var __gmStorageQueue = [];

chrome.storage.local.get(null, function(items) {
  __gmStorage = items || {};
  __gmStorageReady = true;
  __gmStorageQueue.forEach(function(fn) { fn(); });
  __gmStorageQueue = [];
});

function GM_setValue(key, value) {
  __gmStorage[key] = value;
  chrome.storage.local.set({ [key]: value });
}

function GM_getValue(key, defaultValue) {
  if (key in __gmStorage) return __gmStorage[key];
  return defaultValue !== undefined ? defaultValue : null;
}

function GM_deleteValue(key) {
  delete __gmStorage[key];
  chrome.storage.local.remove(key);
}

function GM_listValues() {
  return Object.keys(__gmStorage);
}
"#;

pub const XML_HTTP_REQUEST: &str = r#"
function GM_xmlhttpRequest(details) {
  var _details = {
    __gmxhr: true,
    url: details.url,
    method: details.method || 'GET',
    headers: details.headers || {},
    data: details.data || null,
    responseType: details.responseType || 'text',
    timeout: details.timeout || 0,
  };
  chrome.runtime.sendMessage(_details, function(response) {
    var fail = function(error) {
      if (typeof details.onerror === 'function') details.onerror({ error: error });
    };
    if (chrome.runtime.lastError) return fail(chrome.runtime.lastError.message);
    if (!response) return fail('No response from background');
    if (response.error) return fail(response.error);
    if (typeof details.onload === 'function') {
      details.onload({
        status: response.status,
        statusText: response.statusText || '',
        responseText: response.responseText || '',
        responseHeaders: response.responseHeaders || '',
        finalUrl: details.url,
        readyState: 4,
        response: response.responseText || '',
      });
    }
  });
  return { abort: function() {} };
}
"#;

pub const XML_HTTP_REQUEST_HANDLER: &str = r#"
chrome.runtime.onMessage.addListener(function(msg, sender, sendResponse) {
  if (!msg.__gmxhr) return false;
  var fetchOptions = {
    method: msg.method || 'GET',
    headers: msg.headers || {},
  };
  if (msg.data && msg.method !== 'GET' && msg.method !== 'HEAD') {
    fetchOptions.body = msg.data;
  }
  fetch(msg.url, fetchOptions)
    .then(function(r) {
      var headers = '';
      r.headers.forEach(function(v, k) { headers += k + ': ' + v + '\r\n'; });
      return r.text().then(function(text) {
        sendResponse({
          status: r.status,
          statusText: r.statusText,
          responseText: text,
          responseHeaders: headers,
        });
      });
    })
    .catch(function(err) {
      sendResponse({ error: err.message });
    });
  return true;
});
"#;

pub const NOTIFICATION: &str = r#"
function GM_notification(details, ondone) {
  var opts = typeof details === 'string'
    ? { text: details, title: 'Notification', image: '' }
    : details;
  chrome.runtime.sendMessage({
    __gmnotify: true,
    title: opts.title || 'Script Notification',
    message: opts.text || opts.message || '',
    iconUrl: opts.image || '',
  }, function() {
    var done = opts.ondone || ondone;
    if (typeof done === 'function') done();
  });
}
"#;

pub const NOTIFICATION_HANDLER: &str = r#"
chrome.runtime.onMessage.addListener(function(msg, sender, sendResponse) {
  if (!msg.__gmnotify) return false;
  chrome.notifications.create({
    type: 'basic',
    iconUrl: msg.iconUrl || 'icons/icon48.png',
    title: msg.title,
    message: msg.message,
  }, function(id) {
    sendResponse({ id: id });
  });
  return true;
});
"#;

pub const SET_CLIPBOARD: &str = r#"
function GM_setClipboard(data, info) {
  if (navigator.clipboard && navigator.clipboard.writeText) {
    navigator.clipboard.writeText(data).catch(function(err) {
      console.warn('[GM_setClipboard] Failed:', err);
    });
    return;
  }
  var el = document.createElement('textarea');
  el.value = data;
  el.style.position = 'fixed';
  el.style.opacity = '0';
  document.body.appendChild(el);
  el.select();
  document.execCommand('copy');
  document.body.removeChild(el);
}
"#;

pub const OPEN_IN_TAB: &str = r#"
function GM_openInTab(url, options) {
  var active = true;
  if (typeof options === 'boolean') active = !options;
  else if (options && typeof options === 'object') active = options.active !== false;
  chrome.runtime.sendMessage({ __gmopenTab: true, url: url, active: active });
}
"#;

pub const OPEN_IN_TAB_HANDLER: &str = r#"
chrome.runtime.onMessage.addListener(function(msg, sender, sendResponse) {
  if (!msg.__gmopenTab) return false;
  chrome.tabs.create({ url: msg.url, active: msg.active !== false });
  return false;
});
"#;

pub const LOG: &str = r#"
function GM_log() {
  console.log.apply(console, arguments);
}
"#;

/// `GM_info` filled from the script header. Arguments must already be JSON
/// string literals.
pub fn info(name_literal: &str, version_literal: &str, description_literal: &str) -> String {
    format!(
        r#"
var GM_info = {{
  script: {{
    name: {name_literal},
    version: {version_literal},
    description: {description_literal},
  }},
  scriptMetaStr: '',
  scriptHandler: 'script2ext',
  version: '4.0',
}};
"#
    )
}
